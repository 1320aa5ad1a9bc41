//! Partner Orderer
//!
//! Orders each generation so partners sit next to each other. Greedy and
//! deterministic, not a global optimum.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::engine::directory::{Partnership, Person};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedGeneration {
    pub generation: i32,
    pub person_ids: Vec<String>,
}

pub struct PartnerOrderer;

/// Baseline key: surname, given name, id
fn baseline(a: &Person, b: &Person) -> Ordering {
    let given = |p: &Person| p.given_name.clone().unwrap_or_else(|| p.full_name.clone());
    a.surname
        .as_deref()
        .unwrap_or("")
        .cmp(b.surname.as_deref().unwrap_or(""))
        .then_with(|| given(a).cmp(&given(b)))
        .then_with(|| a.id.cmp(&b.id))
}

impl PartnerOrderer {
    /// Generations ascending; within each, one pass in baseline order that
    /// pulls every not-yet-placed same-generation partner in right behind,
    /// breadth-first, so partner chains stay contiguous.
    pub fn order(persons: &[Person], partnerships: &[Partnership]) -> Vec<OrderedGeneration> {
        let mut generations: BTreeMap<i32, Vec<&Person>> = BTreeMap::new();
        for person in persons {
            generations.entry(person.generation()).or_default().push(person);
        }

        let generation_of: HashMap<&str, i32> = persons
            .iter()
            .map(|p| (p.id.as_str(), p.generation()))
            .collect();

        // Partnership status does not matter for placement
        let mut partners: HashMap<&str, Vec<&str>> = HashMap::new();
        for partnership in partnerships {
            let (a, b) = (partnership.person1_id.as_str(), partnership.person2_id.as_str());
            if a == b {
                continue;
            }
            match (generation_of.get(a), generation_of.get(b)) {
                (Some(ga), Some(gb)) if ga == gb => {
                    partners.entry(a).or_default().push(b);
                    partners.entry(b).or_default().push(a);
                }
                _ => {}
            }
        }

        generations
            .into_iter()
            .map(|(generation, mut members)| {
                members.sort_by(|a, b| baseline(a, b));
                let rank: HashMap<&str, usize> = members
                    .iter()
                    .enumerate()
                    .map(|(i, p)| (p.id.as_str(), i))
                    .collect();

                let mut placed: HashSet<&str> = HashSet::with_capacity(members.len());
                let mut person_ids = Vec::with_capacity(members.len());
                let mut queue = VecDeque::new();

                for person in &members {
                    if !placed.insert(person.id.as_str()) {
                        continue;
                    }
                    queue.push_back(person.id.as_str());

                    while let Some(current) = queue.pop_front() {
                        person_ids.push(current.to_string());

                        let mut next: Vec<&str> = partners
                            .get(current)
                            .map(|list| list.iter().copied().filter(|p| !placed.contains(p)).collect())
                            .unwrap_or_default();
                        next.sort_by_key(|p| rank.get(p).copied().unwrap_or(usize::MAX));
                        next.dedup();
                        for partner in next {
                            if placed.insert(partner) {
                                queue.push_back(partner);
                            }
                        }
                    }
                }

                OrderedGeneration { generation, person_ids }
            })
            .collect()
    }
}
