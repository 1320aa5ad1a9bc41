//! Generation Resolver
//!
//! A bridged person keeps the canonical generation from its home branch
//! unless an admin pins a display generation on the link.

use chrono::Utc;
use rusqlite::TransactionBehavior;
use serde_json::Value;
use std::sync::Arc;

use super::model::{BridgeLink, LinkStatus};
use super::store::BridgeLinkStore;
use crate::engine::authz::{require_elevated, ModerationRights};
use crate::engine::database::Database;
use crate::engine::error::{validate_id, BridgeError, ConflictKind, Result, ValidationKind};

pub const MIN_GENERATION: i32 = 1;
pub const MAX_GENERATION_OVERRIDE: i32 = 30;

pub struct GenerationResolver {
    db: Database,
    rights: Arc<dyn ModerationRights>,
}

impl GenerationResolver {
    pub fn new(db: Database, rights: Arc<dyn ModerationRights>) -> Self {
        Self { db, rights }
    }

    /// Override, else canonical, else 1; never below 1
    pub fn resolve(link: &BridgeLink, canonical: Option<i32>) -> i32 {
        link.display_generation_override
            .or(canonical)
            .unwrap_or(MIN_GENERATION)
            .max(MIN_GENERATION)
    }

    pub fn validate_override(value: Option<i64>) -> Result<Option<i32>> {
        match value {
            None => Ok(None),
            Some(v) if (i64::from(MIN_GENERATION)..=i64::from(MAX_GENERATION_OVERRIDE)).contains(&v) => {
                Ok(Some(v as i32))
            }
            Some(v) => Err(ValidationKind::OutOfRange(v.to_string()).into()),
        }
    }

    /// Read a requested override from JSON. Null clears it; anything that is
    /// not an integral number is out of range.
    pub fn override_from_json(value: &Value) -> Result<Option<i64>> {
        let integral = match value {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < 1e15)
                    .map(|f| f as i64)
            }),
            _ => None,
        };
        match integral {
            Some(v) => Ok(Some(v)),
            None => Err(ValidationKind::OutOfRange(value.to_string()).into()),
        }
    }

    /// Pin or clear the display generation of a link
    pub fn set_override(&self, link_id: &str, value: Option<i64>, actor_id: &str) -> Result<BridgeLink> {
        validate_id("link id", link_id)?;
        let value = Self::validate_override(value)?;

        let branch_id = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn)
                .get(link_id)?
                .ok_or_else(|| BridgeError::not_found("Link", link_id))?
                .source_branch_id
        };
        require_elevated(self.rights.as_ref(), actor_id, &branch_id)?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = BridgeLinkStore::new(&tx);
        let mut link = store
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))?;

        if link.status == LinkStatus::Rejected {
            return Err(ConflictKind::AlreadyResolved.into());
        }

        link.display_generation_override = value;
        link.updated_at = Utc::now();
        store.update(&link)?;
        tx.commit()?;

        tracing::info!(link_id, generation = ?value, actor = actor_id, "bridge generation override updated");
        Ok(link)
    }
}
