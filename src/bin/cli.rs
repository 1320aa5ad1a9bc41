//! Rootbridge CLI - Main entry point for CLI binary
//!
//! This binary provides the `rootbridge` CLI tool for managing bridge links.

use clap::Parser;
use rootbridge_lib::engine::{
    api::{create_router, ApiState},
    bridge::BridgeService,
    cli::{formatter::CliFormatter, parse_status, Cli, Commands, LinkAction, OutputFormat},
    config::Config,
    database::Database,
    dataset::Dataset,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli.get_project_dir());

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&e.to_string());
        std::process::exit(1);
    }
}

/// RUST_LOG wins; otherwise the project's `log.filter`, else warnings only
fn init_tracing(project_dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = Config::load(project_dir)
            .map(|c| c.log.filter)
            .unwrap_or_else(|_| "warn".to_string());
        EnvFilter::new(directive)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_cli(cli: Cli) -> CliResult {
    let project_dir = cli.get_project_dir();
    let json_output = cli.format == OutputFormat::Json;

    match cli.command {
        Commands::Init { name } => cmd_init(cli.project.as_deref(), &name, json_output),
        Commands::Import { file } => cmd_import(&project_dir, &file, json_output),
        Commands::Serve { port, host } => cmd_serve(&project_dir, host, port),
        Commands::Status => cmd_status(&project_dir, json_output),
        Commands::Link { action } => cmd_link(action, &project_dir, cli.user.as_deref(), json_output),
        Commands::Issues => {
            let service = open_service(&project_dir)?;
            let summaries = service.list_issues_by_pair()?;
            output(&summaries, json_output, || CliFormatter::issues(&summaries))
        }
        Commands::Tree { branch } => {
            let service = open_service(&project_dir)?;
            let tree = service.assemble_tree(&branch)?;
            output(&tree, json_output, || CliFormatter::tree(&tree))
        }
    }
}

fn output<T: Serialize>(value: &T, json: bool, text: impl FnOnce()) -> CliResult {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        text();
    }
    Ok(())
}

fn open_database(project_dir: &Path) -> Result<(Config, Database), Box<dyn std::error::Error>> {
    let config = Config::load(project_dir)?;
    let db = Database::new(&config.database_path(project_dir))?;
    Ok((config, db))
}

fn open_service(project_dir: &Path) -> Result<BridgeService, Box<dyn std::error::Error>> {
    let (_, db) = open_database(project_dir)?;
    Ok(BridgeService::sqlite(db))
}

fn require_user(user: Option<&str>) -> Result<&str, Box<dyn std::error::Error>> {
    user.ok_or_else(|| "This command needs an acting user. Pass --user <id>.".into())
}

fn cmd_init(project: Option<&Path>, name: &str, json: bool) -> CliResult {
    let project_dir = match project {
        Some(dir) => dir.to_path_buf(),
        None => {
            let home_dir = dirs::home_dir().ok_or("Could not find home directory")?;
            home_dir.join("Rootbridge").join("projects").join(name)
        }
    };

    if project_dir.join(rootbridge_lib::engine::config::CONFIG_FILE).exists() {
        return Err(format!("Project already initialized: {}", project_dir.display()).into());
    }
    std::fs::create_dir_all(&project_dir)?;

    let config = Config::default_for_project(name);
    config.save(&project_dir)?;

    let gitignore = "# Rootbridge\ndata/*.db\ndata/*.db-*\n*.log\n";
    std::fs::write(project_dir.join(".gitignore"), gitignore)?;

    // Creates the database and applies the schema
    let db = Database::new(&config.database_path(&project_dir))?;
    let status = db.migration_status()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "project": name,
                "path": project_dir,
                "migrations_applied": status.applied_count,
            })
        );
    } else {
        CliFormatter::success(&format!("Project '{}' created", name));
        CliFormatter::kv("Path", &project_dir.display().to_string());
        CliFormatter::info("Next: rootbridge import <dataset.json>");
    }
    Ok(())
}

fn cmd_import(project_dir: &Path, file: &Path, json: bool) -> CliResult {
    let (_, db) = open_database(project_dir)?;
    let dataset = Dataset::load(file)?;
    let summary = dataset.apply(&db)?;

    output(&summary, json, || {
        CliFormatter::success(&format!("Imported {}", file.display()));
        CliFormatter::kv("Branches", &summary.branches.to_string());
        CliFormatter::kv("Persons", &summary.persons.to_string());
        CliFormatter::kv("Partnerships", &summary.partnerships.to_string());
        CliFormatter::kv("Users", &summary.users.to_string());
        CliFormatter::kv("Memberships", &summary.members.to_string());
    })
}

#[tokio::main]
async fn cmd_serve(project_dir: &Path, host: Option<String>, port: Option<u16>) -> CliResult {
    let (config, db) = open_database(project_dir)?;

    let state = ApiState {
        service: Arc::new(BridgeService::sqlite(db)),
    };
    let app = create_router(state);

    let addr = format!(
        "{}:{}",
        host.unwrap_or(config.api.host),
        port.unwrap_or(config.api.port)
    );
    CliFormatter::header("Rootbridge API Server");
    CliFormatter::kv("Project", &config.project.name);
    CliFormatter::kv("Listening", &format!("http://{}", addr));
    CliFormatter::kv("OpenAPI", &format!("http://{}/api/openapi.json", addr));
    CliFormatter::info("Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "api server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn cmd_status(project_dir: &Path, json: bool) -> CliResult {
    let (config, db) = open_database(project_dir)?;
    let status = db.migration_status()?;
    let tables = db.table_counts()?;
    let links = BridgeService::sqlite(db).status_counts()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "project": config.project.name,
                "database": config.database.path,
                "api_port": config.api.port,
                "migrations": status,
                "tables": tables.iter().map(|(t, c)| (t.clone(), *c)).collect::<std::collections::BTreeMap<_, _>>(),
                "links": links.iter().map(|(s, c)| (s.as_str(), *c)).collect::<std::collections::BTreeMap<_, _>>(),
            })
        );
        return Ok(());
    }

    CliFormatter::header("Rootbridge Project Status");
    CliFormatter::kv("Project", &config.project.name);
    CliFormatter::kv("Database", &config.database.path.display().to_string());
    CliFormatter::kv("API Port", &config.api.port.to_string());
    CliFormatter::kv(
        "Migrations",
        &format!("{} applied, {} pending", status.applied_count, status.pending_count),
    );
    for name in &status.drifted {
        CliFormatter::warning(&format!("Migration {} changed after it was applied", name));
    }
    for (table, count) in &tables {
        CliFormatter::kv(table, &count.to_string());
    }
    for (link_status, count) in &links {
        CliFormatter::kv(&format!("{} links", link_status), &count.to_string());
    }
    Ok(())
}

fn cmd_link(action: LinkAction, project_dir: &Path, user: Option<&str>, json: bool) -> CliResult {
    let service = open_service(project_dir)?;

    match action {
        LinkAction::Request {
            person,
            branch,
            display_name,
            notes,
        } => {
            let link = service.request_link(&person, &branch, require_user(user)?, display_name, notes)?;
            output(&link, json, || {
                CliFormatter::success("Bridge link requested");
                CliFormatter::link(&link);
            })
        }
        LinkAction::Approve { link_id } => {
            let link = service.approve_link(&link_id, require_user(user)?)?;
            output(&link, json, || {
                CliFormatter::success(&format!("Link is {}", link.status));
                CliFormatter::link(&link);
            })
        }
        LinkAction::Reject { link_id, reason } => {
            let link = service.reject_link(&link_id, require_user(user)?, reason)?;
            output(&link, json, || CliFormatter::success("Bridge link rejected"))
        }
        LinkAction::Primary { link_id } => {
            let summary = service.set_primary(&link_id, require_user(user)?)?;
            output(&summary, json, || {
                CliFormatter::success("Primary bridge assigned");
                CliFormatter::issues(std::slice::from_ref(&summary));
            })
        }
        LinkAction::Unprimary { link_id } => {
            let summary = service.clear_primary(&link_id, require_user(user)?)?;
            output(&summary, json, || {
                CliFormatter::success("Primary bridge cleared");
                CliFormatter::issues(std::slice::from_ref(&summary));
            })
        }
        LinkAction::Generation { link_id, value } => {
            let link = service.set_generation_override(&link_id, value, require_user(user)?)?;
            output(&link, json, || match link.display_generation_override {
                Some(generation) => CliFormatter::success(&format!("Display generation pinned to {}", generation)),
                None => CliFormatter::success("Display generation override cleared"),
            })
        }
        LinkAction::List { branch, status } => {
            let status = parse_status(status.as_deref())?;
            let links = service.list_links(&branch, status)?;
            output(&links, json, || CliFormatter::links(&links))
        }
        LinkAction::Show { link_id } => {
            let link = service.get_link(&link_id)?;
            output(&link, json, || CliFormatter::link(&link))
        }
        LinkAction::Candidates { branch, query, limit } => {
            let candidates = service.link_candidates(&branch, query.as_deref(), limit)?;
            output(&candidates, json, || CliFormatter::candidates(&candidates))
        }
    }
}
