// Rootbridge Engine - Core module structure
pub mod api;
pub mod authz;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod database;
pub mod dataset;
pub mod directory;
pub mod error;
pub mod migrations;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::BridgeService;
pub use config::Config;
pub use database::Database;
pub use error::{BridgeError, Result};
