//! Primary Bridge Enforcement
//!
//! At most one approved link per unordered branch pair carries the primary
//! flag. Promotion runs in an IMMEDIATE transaction so concurrent admins
//! serialize on the SQLite write lock; the partial unique index on
//! `(pair_low, pair_high) WHERE is_primary = 1` backs it up.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use std::sync::Arc;

use super::model::{BridgeLink, LinkStatus};
use super::store::BridgeLinkStore;
use crate::engine::authz::{require_elevated, ModerationRights};
use crate::engine::database::Database;
use crate::engine::error::{validate_id, BridgeError, ConflictKind, Result};

pub struct PrimacyEnforcer {
    db: Database,
    rights: Arc<dyn ModerationRights>,
}

impl PrimacyEnforcer {
    pub fn new(db: Database, rights: Arc<dyn ModerationRights>) -> Self {
        Self { db, rights }
    }

    fn authorize(&self, link_id: &str, actor_id: &str) -> Result<()> {
        validate_id("link id", link_id)?;
        let branch_id = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn)
                .get(link_id)?
                .ok_or_else(|| BridgeError::not_found("Link", link_id))?
                .source_branch_id
        };
        require_elevated(self.rights.as_ref(), actor_id, &branch_id)
    }

    /// Demote every other link of the pair and promote this one
    pub fn set_primary(&self, link_id: &str, actor_id: &str) -> Result<BridgeLink> {
        self.authorize(link_id, actor_id)?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = BridgeLinkStore::new(&tx);
        let mut link = store
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))?;

        if link.status != LinkStatus::Approved {
            return Err(ConflictKind::NotApproved.into());
        }
        if link.is_primary {
            return Ok(link);
        }

        let now = Utc::now();
        let demoted = store.demote_pair(&link.pair(), &link.id, now)?;
        link.is_primary = true;
        link.primary_set_at = Some(now);
        link.primary_set_by = Some(actor_id.to_string());
        link.updated_at = now;
        store.update(&link).map_err(primacy_conflict)?;
        tx.commit().map_err(primacy_conflict)?;

        tracing::info!(
            link_id,
            pair = %link.pair().pair_id(),
            demoted,
            actor = actor_id,
            "primary bridge assigned"
        );
        Ok(link)
    }

    /// Unconditionally drop the primary flag; a pair may have none
    pub fn clear_primary(&self, link_id: &str, actor_id: &str) -> Result<BridgeLink> {
        self.authorize(link_id, actor_id)?;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut link = BridgeLinkStore::new(&tx)
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))?;

        if Self::clear_within(&tx, &mut link, Utc::now())? {
            tx.commit()?;
            tracing::info!(link_id, actor = actor_id, "primary bridge cleared");
        }
        Ok(link)
    }

    /// Clear primacy inside a caller's transaction. Returns whether the flag
    /// was set.
    pub(crate) fn clear_within(conn: &Connection, link: &mut BridgeLink, at: DateTime<Utc>) -> Result<bool> {
        if !link.is_primary {
            return Ok(false);
        }
        link.is_primary = false;
        link.primary_set_at = None;
        link.primary_set_by = None;
        link.updated_at = at;
        BridgeLinkStore::new(conn).update(link)?;
        Ok(true)
    }
}

fn primacy_conflict(err: rusqlite::Error) -> BridgeError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            ConflictKind::PrimacyRace.into()
        }
        _ => err.into(),
    }
}
