//! Rootbridge CLI Module
//! Command-line interface for bridge link operations

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::bridge::model::LinkStatus;

#[derive(Parser, Debug)]
#[command(name = "rootbridge")]
#[command(author = "Rootbridge Team")]
#[command(version)]
#[command(about = "Cross-branch bridge links for family trees", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Acting user id for moderation commands
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new Rootbridge project
    Init {
        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// Import branches, persons, partnerships and members from a JSON file
    Import {
        /// Dataset file
        file: PathBuf,
    },

    /// Start local API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Show project status
    Status,

    /// Bridge link commands
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Show bridge links grouped by branch pair
    Issues,

    /// Assemble the multi-branch tree around a branch
    Tree {
        /// Anchor branch id
        branch: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum LinkAction {
    /// Request a bridge for a person into your branch
    Request {
        /// Person to bridge in
        person: String,

        /// Requesting branch
        #[arg(short, long)]
        branch: String,

        /// Label shown on the bridge
        #[arg(long)]
        display_name: Option<String>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Approve a pending link for the side you moderate
    Approve { link_id: String },

    /// Reject a link
    Reject {
        link_id: String,

        /// Reason, stored in the link notes
        #[arg(short, long)]
        reason: Option<String>,
    },

    /// Make a link the primary bridge of its branch pair
    Primary { link_id: String },

    /// Clear the primary flag
    Unprimary { link_id: String },

    /// Pin the display generation (omit the value to clear it)
    Generation {
        link_id: String,

        value: Option<i64>,
    },

    /// List links touching a branch
    List {
        branch: String,

        /// pending, approved or rejected
        #[arg(short, long)]
        status: Option<String>,
    },

    /// Show one link
    Show { link_id: String },

    /// Find persons in other branches that could be bridged in
    Candidates {
        /// Branch that would request the link
        branch: String,

        /// Name filter, ignoring case
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum results (1-100)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Parse a `--status` filter
pub fn parse_status(value: Option<&str>) -> Result<Option<LinkStatus>, String> {
    match value {
        None => Ok(None),
        Some(s) => LinkStatus::parse(&s.to_ascii_lowercase())
            .map(Some)
            .ok_or_else(|| format!("unknown link status: {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link_commands() {
        let cli = Cli::parse_from([
            "rootbridge", "--user", "alice", "link", "request", "b-ngozi", "--branch", "branch-a",
        ]);
        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::Link {
                action: LinkAction::Request { person, branch, .. },
            } => {
                assert_eq!(person, "b-ngozi");
                assert_eq!(branch, "branch-a");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["rootbridge", "link", "generation", "l1", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::Link {
                action: LinkAction::Generation { value: None, .. }
            }
        ));
    }

    #[test]
    fn test_parse_candidates() {
        let cli = Cli::parse_from(["rootbridge", "link", "candidates", "branch-a", "-q", "bello", "--limit", "5"]);
        match cli.command {
            Commands::Link {
                action: LinkAction::Candidates { branch, query, limit },
            } => {
                assert_eq!(branch, "branch-a");
                assert_eq!(query.as_deref(), Some("bello"));
                assert_eq!(limit, Some(5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("Approved")).unwrap(), Some(LinkStatus::Approved));
        assert!(parse_status(Some("maybe")).is_err());
    }
}
