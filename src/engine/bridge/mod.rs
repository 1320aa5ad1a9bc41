//! Cross-branch bridge links

pub mod candidates;
pub mod generation;
pub mod issues;
pub mod model;
pub mod primacy;
pub mod service;
pub mod store;
pub mod workflow;

pub use candidates::{LinkCandidate, DEFAULT_CANDIDATE_LIMIT, MAX_CANDIDATE_LIMIT};
pub use generation::{GenerationResolver, MAX_GENERATION_OVERRIDE, MIN_GENERATION};
pub use issues::{BranchSummary, BridgeIssueLinkSummary, BridgeIssueSummary, IssuePerson};
pub use model::{AwaitingSide, BranchPair, BridgeLink, LinkStatus, Side};
pub use primacy::PrimacyEnforcer;
pub use service::BridgeService;
pub use store::BridgeLinkStore;
pub use workflow::{ApprovalWorkflow, LinkRequest};
