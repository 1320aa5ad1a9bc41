//! Tree Assembler
//!
//! Lays out the anchor branch and every branch one approved bridge away, each
//! in its own coordinate system, then stitches the bridge edges in. Reads a
//! best-effort snapshot; a bad link only costs its own edge.

use std::collections::HashMap;
use std::sync::Arc;

use super::graph::{
    compound_id, AssembledTree, BranchGraph, DataIntegrityWarning, EdgeKind, GraphEdge, GraphNode, NodeId,
    NodeKind,
};
use super::orderer::PartnerOrderer;
use crate::engine::bridge::generation::GenerationResolver;
use crate::engine::bridge::model::BridgeLink;
use crate::engine::bridge::store::BridgeLinkStore;
use crate::engine::database::Database;
use crate::engine::directory::{Branch, BranchDirectory, Person};
use crate::engine::error::{validate_id, BridgeError, Result};

pub struct TreeAssembler {
    db: Database,
    directory: Arc<dyn BranchDirectory>,
}

/// A laid-out branch plus its member records, kept for bridge lookups
struct LaidOutBranch {
    graph: BranchGraph,
    persons: HashMap<String, Person>,
}

impl TreeAssembler {
    pub fn new(db: Database, directory: Arc<dyn BranchDirectory>) -> Self {
        Self { db, directory }
    }

    pub fn assemble(&self, anchor_branch_id: &str) -> Result<AssembledTree> {
        validate_id("branch id", anchor_branch_id)?;
        let anchor_branch = self
            .directory
            .branch(anchor_branch_id)?
            .ok_or_else(|| BridgeError::not_found("Branch", anchor_branch_id))?;

        let links = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn).list_approved_touching(anchor_branch_id)?
        };

        let mut anchor = self.lay_out(anchor_branch)?;
        let mut connected: Vec<LaidOutBranch> = Vec::new();
        let mut missing_branches: Vec<String> = Vec::new();
        let mut warnings = Vec::new();

        for link in &links {
            let Some(other_id) = link.other_branch(anchor_branch_id) else {
                continue;
            };

            // One hop only: each directly bridged branch is laid out once
            let slot = match connected.iter().position(|b| b.graph.branch_id() == other_id) {
                Some(slot) => slot,
                None if missing_branches.iter().any(|b| b == other_id) => {
                    warnings.push(missing_branch_warning(link, other_id));
                    continue;
                }
                None => match self.directory.branch(other_id)? {
                    Some(branch) => {
                        connected.push(self.lay_out(branch)?);
                        connected.len() - 1
                    }
                    None => {
                        tracing::warn!(link_id = %link.id, branch = other_id, "connected branch not found");
                        missing_branches.push(other_id.to_string());
                        warnings.push(missing_branch_warning(link, other_id));
                        continue;
                    }
                },
            };

            if let Err(warning) = stitch(link, &mut anchor, &mut connected[slot]) {
                tracing::warn!(link_id = %link.id, person_id = %link.person_id, "{}", warning.message);
                warnings.push(warning);
            }
        }

        tracing::debug!(
            anchor = anchor_branch_id,
            links = links.len(),
            connected = connected.len(),
            warnings = warnings.len(),
            "tree assembled"
        );

        Ok(AssembledTree {
            anchor_branch: anchor.graph,
            connected_branches: connected.into_iter().map(|b| b.graph).collect(),
            warnings,
        })
    }

    /// Row is generation - 1, column is the partner-aware order within it
    fn lay_out(&self, branch: Branch) -> Result<LaidOutBranch> {
        let persons = self.directory.persons(&branch.id)?;
        let partnerships = self.directory.partnerships(&branch.id)?;
        let by_id: HashMap<String, Person> = persons.iter().map(|p| (p.id.clone(), p.clone())).collect();

        let mut graph = BranchGraph::new(branch);
        for generation in PartnerOrderer::order(&persons, &partnerships) {
            for (column, person_id) in generation.person_ids.iter().enumerate() {
                let Some(person) = by_id.get(person_id) else {
                    continue;
                };
                graph.add_node(GraphNode {
                    id: NodeId::new(graph.branch_id(), &person.id),
                    label: person.full_name.clone(),
                    generation: generation.generation,
                    row: generation.generation - 1,
                    column: column as i32,
                    kind: NodeKind::Person,
                    link_ids: Vec::new(),
                });
            }
        }

        let branch_id = graph.branch_id().to_string();
        for person in &persons {
            let child = NodeId::new(&branch_id, &person.id);
            let parents = [
                (person.father_id.as_deref(), "father", EdgeKind::Father),
                (person.mother_id.as_deref(), "mother", EdgeKind::Mother),
            ];
            for (parent_id, label, kind) in parents {
                let Some(parent_id) = parent_id else {
                    continue;
                };
                let parent = NodeId::new(&branch_id, parent_id);
                if !graph.contains(&parent) {
                    tracing::debug!(branch = %branch_id, person = %person.id, parent = parent_id, "parent outside branch");
                    continue;
                }
                graph.edges.push(GraphEdge {
                    id: compound_id(&[&branch_id, label, parent_id, &person.id]),
                    source: parent,
                    target: child.clone(),
                    kind,
                });
            }
        }

        for partnership in &partnerships {
            let a = NodeId::new(&branch_id, &partnership.person1_id);
            let b = NodeId::new(&branch_id, &partnership.person2_id);
            if !graph.contains(&a) || !graph.contains(&b) {
                continue;
            }
            graph.edges.push(GraphEdge {
                id: compound_id(&[&branch_id, "partnership", &partnership.id]),
                source: a,
                target: b,
                kind: EdgeKind::Partner {
                    status: partnership.status,
                    partnership_id: partnership.id.clone(),
                },
            });
        }

        Ok(LaidOutBranch { graph, persons: by_id })
    }
}

fn missing_branch_warning(link: &BridgeLink, branch_id: &str) -> DataIntegrityWarning {
    DataIntegrityWarning {
        link_id: Some(link.id.clone()),
        person_id: Some(link.person_id.clone()),
        message: format!("connected branch {} not found", branch_id),
    }
}

/// Make sure both endpoints exist and add the bridge edge to the anchor graph
fn stitch(
    link: &BridgeLink,
    anchor: &mut LaidOutBranch,
    other: &mut LaidOutBranch,
) -> std::result::Result<(), DataIntegrityWarning> {
    let person = anchor
        .persons
        .get(&link.person_id)
        .or_else(|| other.persons.get(&link.person_id))
        .cloned()
        .ok_or_else(|| DataIntegrityWarning {
            link_id: Some(link.id.clone()),
            person_id: Some(link.person_id.clone()),
            message: format!(
                "person {} is in neither {} nor {}",
                link.person_id,
                anchor.graph.branch_id(),
                other.graph.branch_id()
            ),
        })?;

    let label = link.display_name.clone().unwrap_or_else(|| person.full_name.clone());
    let generation = GenerationResolver::resolve(link, Some(person.generation()));

    let source = ensure_bridge_node(&mut anchor.graph, link, &person, &label, generation);
    let target = ensure_bridge_node(&mut other.graph, link, &person, &label, generation);

    anchor.graph.edges.push(GraphEdge {
        id: compound_id(&["bridge", &link.id]),
        source,
        target,
        kind: EdgeKind::Bridge {
            link_id: link.id.clone(),
            primary: link.is_primary,
        },
    });
    Ok(())
}

/// Mark an existing member as a bridge endpoint, or synthesize a placeholder
/// at the resolved generation's row and the next free column
fn ensure_bridge_node(
    graph: &mut BranchGraph,
    link: &BridgeLink,
    person: &Person,
    label: &str,
    generation: i32,
) -> NodeId {
    let id = NodeId::new(graph.branch_id(), &person.id);
    if let Some(node) = graph.node_mut(&id) {
        if node.kind == NodeKind::Person {
            node.kind = NodeKind::Bridge;
        }
        if !node.link_ids.contains(&link.id) {
            node.link_ids.push(link.id.clone());
        }
        return id;
    }

    let row = generation - 1;
    let column = graph.next_free_column(row);
    graph.add_node(GraphNode {
        id: id.clone(),
        label: label.to_string(),
        generation,
        row,
        column,
        kind: NodeKind::Placeholder,
        link_ids: vec![link.id.clone()],
    });
    id
}
