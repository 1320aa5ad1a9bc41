//! Link candidates: persons from other branches that a branch could still
//! request a bridge for.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::issues::BranchSummary;
use crate::engine::directory::{BranchDirectory, Person};
use crate::engine::error::Result;

pub const DEFAULT_CANDIDATE_LIMIT: usize = 20;
pub const MAX_CANDIDATE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCandidate {
    pub id: String,
    pub full_name: String,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub generation_number: Option<i32>,
    pub home_branch: Option<BranchSummary>,
}

/// Clamp a requested page size into 1..=MAX_CANDIDATE_LIMIT
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_CANDIDATE_LIMIT)
        .clamp(1, MAX_CANDIDATE_LIMIT)
}

/// Drop already-linked persons, keep the incoming order, stop at `limit`
pub fn select(
    persons: Vec<Person>,
    linked: &HashSet<String>,
    limit: usize,
    directory: &dyn BranchDirectory,
) -> Result<Vec<LinkCandidate>> {
    let mut branches: HashMap<String, Option<BranchSummary>> = HashMap::new();
    let mut candidates = Vec::new();

    for person in persons.into_iter().filter(|p| !linked.contains(&p.id)).take(limit) {
        let home_branch = match branches.get(&person.branch_id) {
            Some(summary) => summary.clone(),
            None => {
                let summary = directory.branch(&person.branch_id)?.map(|b| BranchSummary {
                    id: b.id,
                    surname: b.surname,
                });
                branches.insert(person.branch_id.clone(), summary.clone());
                summary
            }
        };
        candidates.push(LinkCandidate {
            id: person.id,
            full_name: person.full_name,
            given_name: person.given_name,
            surname: person.surname,
            generation_number: person.generation_number,
            home_branch,
        });
    }
    Ok(candidates)
}
