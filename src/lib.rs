//! Rootbridge - cross-branch bridge links and multi-branch family tree assembly
//!
//! Members keep independent family-tree branches. A person who appears in two
//! branches can be connected by a bridge link that both branches approve; the
//! tree assembler then renders a branch together with every branch one
//! approved bridge away.

pub mod engine;

pub use engine::bridge::{BridgeLink, BridgeService, LinkStatus};
pub use engine::database::Database;
pub use engine::error::{BridgeError, ConflictKind, ValidationKind};
pub use engine::tree::AssembledTree;
