//! CLI Output Formatting Module
//! Provides consistent, colorized output for terminal UX

use colored::Colorize;

use crate::engine::bridge::candidates::LinkCandidate;
use crate::engine::bridge::issues::BridgeIssueSummary;
use crate::engine::bridge::model::{AwaitingSide, BridgeLink, LinkStatus};
use crate::engine::tree::{AssembledTree, BranchGraph, NodeKind};

pub struct CliFormatter;

impl CliFormatter {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green().bold(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow().bold(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue().bold(), message);
    }

    /// Print a section header
    pub fn header(title: &str) {
        println!("\n{}", title.bright_cyan().bold());
        println!("{}", "─".repeat(title.chars().count()).bright_black());
    }

    /// Print a key-value pair
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", key.bright_white().bold(), value);
    }

    /// Print a list item
    pub fn item(text: &str) {
        println!("  {} {}", "•".bright_black(), text);
    }

    /// Print a table header
    pub fn table_header(columns: &[&str]) {
        let header = columns
            .iter()
            .map(|c| c.bright_white().bold().to_string())
            .collect::<Vec<_>>()
            .join(" │ ");
        println!("  {}", header);
        println!("  {}", "─".repeat(columns.iter().map(|c| c.len() + 3).sum()).bright_black());
    }

    /// Print a table row
    pub fn table_row(values: &[&str]) {
        println!("  {}", values.join(" │ "));
    }

    /// Print an empty line
    pub fn blank() {
        println!();
    }

    pub fn status(status: LinkStatus) -> String {
        match status {
            LinkStatus::Pending => status.as_str().yellow().to_string(),
            LinkStatus::Approved => status.as_str().green().to_string(),
            LinkStatus::Rejected => status.as_str().red().to_string(),
        }
    }

    pub fn link(link: &BridgeLink) {
        Self::header(&format!("Link {}", link.id));
        Self::kv("Person", &link.person_id);
        Self::kv("Branches", &format!("{} → {}", link.source_branch_id, link.target_branch_id));
        Self::kv("Status", &Self::status(link.status));
        Self::kv("Awaiting", awaiting_label(link.awaiting_side()));
        Self::kv("Primary", if link.is_primary { "yes" } else { "no" });
        if let Some(generation) = link.display_generation_override {
            Self::kv("Generation override", &generation.to_string());
        }
        if let Some(name) = &link.display_name {
            Self::kv("Display name", name);
        }
        if let Some(notes) = &link.notes {
            Self::kv("Notes", notes);
        }
    }

    pub fn links(links: &[BridgeLink]) {
        if links.is_empty() {
            Self::info("No bridge links");
            return;
        }
        Self::table_header(&["Link", "Person", "Branches", "Status", "Primary"]);
        for link in links {
            let branches = format!("{} → {}", link.source_branch_id, link.target_branch_id);
            let status = Self::status(link.status);
            Self::table_row(&[
                short_id(&link.id),
                &link.person_id,
                &branches,
                &status,
                if link.is_primary { "★" } else { "" },
            ]);
        }
    }

    pub fn candidates(candidates: &[LinkCandidate]) {
        if candidates.is_empty() {
            Self::info("No unlinked persons found");
            return;
        }
        Self::table_header(&["Person", "Name", "Home branch", "Gen"]);
        for candidate in candidates {
            let home = candidate
                .home_branch
                .as_ref()
                .map(|b| format!("{} ({})", b.surname, b.id))
                .unwrap_or_default();
            let generation = candidate
                .generation_number
                .map(|g| g.to_string())
                .unwrap_or_default();
            Self::table_row(&[&candidate.id, &candidate.full_name, &home, &generation]);
        }
    }

    pub fn issues(summaries: &[BridgeIssueSummary]) {
        if summaries.is_empty() {
            Self::info("No open bridge links");
            return;
        }
        for summary in summaries {
            Self::header(&format!(
                "{} ↔ {} ({} links)",
                summary.branch_a.surname, summary.branch_b.surname, summary.total_links
            ));
            if !summary.has_primary {
                Self::warning("No primary bridge assigned");
            }
            for link in &summary.links {
                let name = link
                    .person
                    .as_ref()
                    .map(|p| p.full_name.as_str())
                    .unwrap_or(link.display_name.as_deref().unwrap_or("unknown person"));
                let marker = if link.is_primary { " ★".bright_yellow().to_string() } else { String::new() };
                Self::item(&format!(
                    "{} {} gen {} [{}]{}",
                    short_id(&link.id),
                    name,
                    link.effective_generation,
                    Self::status(link.status),
                    marker
                ));
            }
        }
    }

    pub fn tree(tree: &AssembledTree) {
        Self::graph(&tree.anchor_branch);
        for graph in &tree.connected_branches {
            Self::graph(graph);
        }
        for warning in &tree.warnings {
            Self::warning(&warning.message);
        }
    }

    fn graph(graph: &BranchGraph) {
        Self::header(&format!("{} ({})", graph.branch.surname, graph.branch.id));
        let mut nodes: Vec<_> = graph.nodes.iter().collect();
        nodes.sort_by_key(|n| (n.row, n.column));
        let mut row = None;
        for node in nodes {
            if row != Some(node.row) {
                row = Some(node.row);
                println!("  {}", format!("Generation {}", node.row + 1).bright_black());
            }
            let label = match node.kind {
                NodeKind::Person => node.label.normal(),
                NodeKind::Bridge => node.label.bright_green(),
                NodeKind::Placeholder => format!("({})", node.label).bright_blue(),
            };
            Self::item(&label.to_string());
        }
        Self::kv("Edges", &graph.edges.len().to_string());
    }
}

pub fn awaiting_label(side: AwaitingSide) -> &'static str {
    match side {
        AwaitingSide::Source => "source branch",
        AwaitingSide::Target => "target branch",
        AwaitingSide::None => "nobody",
    }
}

/// First eight characters of a link id
pub fn short_id(id: &str) -> &str {
    id.char_indices().nth(8).map(|(i, _)| &id[..i]).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0b6f3c2e-91aa-4f7e-8d55-2d7c1a0f9e11"), "0b6f3c2e");
        assert_eq!(short_id("l1"), "l1");
    }

    #[test]
    fn test_awaiting_label() {
        assert_eq!(awaiting_label(AwaitingSide::Target), "target branch");
        assert_eq!(awaiting_label(AwaitingSide::None), "nobody");
    }
}
