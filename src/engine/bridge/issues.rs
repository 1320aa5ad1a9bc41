//! Bridge issue summaries: links grouped by unordered branch pair for the
//! admin review screen.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::generation::GenerationResolver;
use super::model::{AwaitingSide, BranchPair, BridgeLink, LinkStatus};
use crate::engine::directory::BranchDirectory;
use crate::engine::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    pub id: String,
    pub surname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuePerson {
    pub id: String,
    pub full_name: String,
    pub generation_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeIssueLinkSummary {
    pub id: String,
    pub status: LinkStatus,
    pub is_primary: bool,
    pub source_branch_id: String,
    pub target_branch_id: String,
    pub awaiting_side: AwaitingSide,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub primary_assigned_at: Option<DateTime<Utc>>,
    pub display_generation_override: Option<i32>,
    pub effective_generation: i32,
    /// None when the person record has gone missing upstream
    pub person: Option<IssuePerson>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeIssueSummary {
    pub pair_id: String,
    pub branch_a: BranchSummary,
    pub branch_b: BranchSummary,
    pub total_links: usize,
    /// Whether one approved link of the pair is primary
    pub has_primary: bool,
    pub primary_link_id: Option<String>,
    pub links: Vec<BridgeIssueLinkSummary>,
}

fn link_summary(link: &BridgeLink, directory: &dyn BranchDirectory) -> Result<BridgeIssueLinkSummary> {
    let person = directory.person(&link.person_id)?;
    let canonical = person.as_ref().map(|p| p.generation());
    Ok(BridgeIssueLinkSummary {
        id: link.id.clone(),
        status: link.status,
        is_primary: link.is_primary,
        source_branch_id: link.source_branch_id.clone(),
        target_branch_id: link.target_branch_id.clone(),
        awaiting_side: link.awaiting_side(),
        display_name: link.display_name.clone(),
        notes: link.notes.clone(),
        approved_at: link.approved_at(),
        primary_assigned_at: link.primary_set_at,
        display_generation_override: link.display_generation_override,
        effective_generation: GenerationResolver::resolve(link, canonical),
        person: person.map(|p| IssuePerson {
            id: p.id,
            full_name: p.full_name,
            generation_number: p.generation_number,
        }),
    })
}

fn status_rank(status: LinkStatus) -> u8 {
    match status {
        LinkStatus::Approved => 0,
        LinkStatus::Pending => 1,
        LinkStatus::Rejected => 2,
    }
}

fn person_name(link: &BridgeIssueLinkSummary) -> &str {
    link.person
        .as_ref()
        .map(|p| p.full_name.as_str())
        .or(link.display_name.as_deref())
        .unwrap_or("")
}

/// Primary first, then approved, then by person name
fn compare_links(a: &BridgeIssueLinkSummary, b: &BridgeIssueLinkSummary) -> Ordering {
    b.is_primary
        .cmp(&a.is_primary)
        .then_with(|| status_rank(a.status).cmp(&status_rank(b.status)))
        .then_with(|| person_name(a).cmp(person_name(b)))
        .then_with(|| a.id.cmp(&b.id))
}

/// Summarize one pair. Returns None when either branch record is missing.
pub fn summarize_pair(
    pair: &BranchPair,
    links: &[BridgeLink],
    directory: &dyn BranchDirectory,
) -> Result<Option<BridgeIssueSummary>> {
    let (Some(low), Some(high)) = (directory.branch(&pair.low)?, directory.branch(&pair.high)?) else {
        tracing::warn!(pair = %pair.pair_id(), "skipping bridge pair with a missing branch record");
        return Ok(None);
    };

    let mut summaries = links
        .iter()
        .map(|link| link_summary(link, directory))
        .collect::<Result<Vec<_>>>()?;
    summaries.sort_by(compare_links);

    let primary_link_id = links
        .iter()
        .find(|l| l.is_primary && l.status == LinkStatus::Approved)
        .map(|l| l.id.clone());

    Ok(Some(BridgeIssueSummary {
        pair_id: pair.pair_id(),
        branch_a: BranchSummary {
            id: low.id,
            surname: low.surname,
        },
        branch_b: BranchSummary {
            id: high.id,
            surname: high.surname,
        },
        total_links: summaries.len(),
        has_primary: primary_link_id.is_some(),
        primary_link_id,
        links: summaries,
    }))
}

/// Group links by unordered pair. Busiest pairs first, ties by pair id.
pub fn summarize(links: Vec<BridgeLink>, directory: &dyn BranchDirectory) -> Result<Vec<BridgeIssueSummary>> {
    let mut by_pair: BTreeMap<BranchPair, Vec<BridgeLink>> = BTreeMap::new();
    for link in links {
        by_pair.entry(link.pair()).or_default().push(link);
    }

    let mut summaries = Vec::with_capacity(by_pair.len());
    for (pair, links) in &by_pair {
        if let Some(summary) = summarize_pair(pair, links, directory)? {
            summaries.push(summary);
        }
    }
    summaries.sort_by(|a, b| {
        b.total_links
            .cmp(&a.total_links)
            .then_with(|| a.pair_id.cmp(&b.pair_id))
    });
    Ok(summaries)
}
