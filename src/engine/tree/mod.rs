//! Multi-branch tree assembly

pub mod assembler;
pub mod graph;
pub mod orderer;

pub use assembler::TreeAssembler;
pub use graph::{AssembledTree, BranchGraph, DataIntegrityWarning, EdgeKind, GraphEdge, GraphNode, NodeId, NodeKind};
pub use orderer::{OrderedGeneration, PartnerOrderer};
