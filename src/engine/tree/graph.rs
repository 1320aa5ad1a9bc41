//! Branch graph: nodes keyed by (branch, person), plus parent, partner and
//! bridge edges.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::engine::directory::{Branch, PartnershipStatus};

/// Node identity. The same person bridged into two branches is two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeId {
    pub branch_id: String,
    pub person_id: String,
}

impl NodeId {
    pub fn new(branch_id: &str, person_id: &str) -> Self {
        Self {
            branch_id: branch_id.to_string(),
            person_id: person_id.to_string(),
        }
    }
}

/// Joins the parts of node and edge ids. Record ids never contain it.
pub const ID_SEPARATOR: &str = ":";

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.branch_id, ID_SEPARATOR, self.person_id)
    }
}

/// `a:b:c` from the given parts
pub fn compound_id(parts: &[&str]) -> String {
    parts.join(ID_SEPARATOR)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A member of the branch with no bridge
    Person,
    /// A member of the branch that is the endpoint of a bridge
    Bridge,
    /// Synthesized for a bridged person who is not a member of the branch
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub generation: i32,
    pub row: i32,
    pub column: i32,
    pub kind: NodeKind,
    /// Bridge links ending at this node
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub link_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeKind {
    Father,
    Mother,
    #[serde(rename_all = "camelCase")]
    Partner {
        status: PartnershipStatus,
        partnership_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Bridge { link_id: String, primary: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub kind: EdgeKind,
}

/// One branch's self-contained layout
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchGraph {
    pub branch: Branch,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl BranchGraph {
    pub fn new(branch: Branch) -> Self {
        Self {
            branch,
            nodes: Vec::new(),
            edges: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn branch_id(&self) -> &str {
        &self.branch.id
    }

    pub fn add_node(&mut self, node: GraphNode) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut GraphNode> {
        self.index.get(id).map(|&i| &mut self.nodes[i])
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }

    /// One past the rightmost column used in `row`
    pub fn next_free_column(&self, row: i32) -> i32 {
        self.nodes
            .iter()
            .filter(|n| n.row == row)
            .map(|n| n.column + 1)
            .max()
            .unwrap_or(0)
    }

    pub fn bridge_edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.edges
            .iter()
            .filter(|e| matches!(e.kind, EdgeKind::Bridge { .. }))
    }
}

/// Non-fatal data fault found while assembling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIntegrityWarning {
    pub link_id: Option<String>,
    pub person_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledTree {
    pub anchor_branch: BranchGraph,
    pub connected_branches: Vec<BranchGraph>,
    pub warnings: Vec<DataIntegrityWarning>,
}

impl AssembledTree {
    pub fn connected(&self, branch_id: &str) -> Option<&BranchGraph> {
        self.connected_branches.iter().find(|g| g.branch.id == branch_id)
    }
}
