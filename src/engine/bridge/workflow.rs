//! Bridge Approval Workflow
//!
//! pending -> approved once both branches agree; pending|approved -> rejected
//! by either side. Rejected is terminal.

use chrono::Utc;
use rusqlite::TransactionBehavior;
use std::sync::Arc;

use super::model::{AwaitingSide, BridgeLink, LinkStatus};
use super::primacy::PrimacyEnforcer;
use super::store::BridgeLinkStore;
use crate::engine::authz::{ModerationRights, SideGrant};
use crate::engine::database::Database;
use crate::engine::directory::BranchDirectory;
use crate::engine::error::{validate_id, BridgeError, ConflictKind, Result, ValidationKind};

/// A moderator's request to connect a person across two branches
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub person_id: String,
    /// The requesting branch
    pub source_branch_id: String,
    pub target_branch_id: String,
    pub requested_by: String,
    pub display_name: Option<String>,
    pub notes: Option<String>,
}

pub struct ApprovalWorkflow {
    db: Database,
    rights: Arc<dyn ModerationRights>,
    directory: Arc<dyn BranchDirectory>,
}

impl ApprovalWorkflow {
    pub fn new(db: Database, rights: Arc<dyn ModerationRights>, directory: Arc<dyn BranchDirectory>) -> Self {
        Self { db, rights, directory }
    }

    pub fn request_link(&self, request: LinkRequest) -> Result<BridgeLink> {
        validate_id("person id", &request.person_id)?;
        validate_id("branch id", &request.source_branch_id)?;
        validate_id("branch id", &request.target_branch_id)?;
        if request.source_branch_id == request.target_branch_id {
            return Err(ValidationKind::SameBranch.into());
        }

        for branch_id in [&request.source_branch_id, &request.target_branch_id] {
            if self.directory.branch(branch_id)?.is_none() {
                return Err(BridgeError::not_found("Branch", branch_id));
            }
        }
        let person = self
            .directory
            .person(&request.person_id)?
            .ok_or_else(|| BridgeError::not_found("Person", &request.person_id))?;
        if person.branch_id != request.source_branch_id && person.branch_id != request.target_branch_id {
            return Err(ValidationKind::PersonNotInPair(person.id).into());
        }

        if !self
            .rights
            .check_moderation_rights(&request.requested_by, &request.source_branch_id)?
            .can_moderate()
        {
            return Err(BridgeError::unauthorized("only branch moderators can request bridge links"));
        }

        let mut link = BridgeLink::requested(
            &request.person_id,
            &request.source_branch_id,
            &request.target_branch_id,
            &request.requested_by,
        );
        link.display_name = request.display_name;
        link.notes = request.notes;

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = BridgeLinkStore::new(&tx);
        if store
            .find_active_for_person_pair(&link.person_id, &link.pair())?
            .is_some()
        {
            return Err(ConflictKind::AlreadyLinked.into());
        }
        store.insert(&link)?;
        tx.commit()?;

        tracing::info!(
            link_id = %link.id,
            person_id = %link.person_id,
            source = %link.source_branch_id,
            target = %link.target_branch_id,
            "bridge link requested"
        );
        Ok(link)
    }

    /// Approve every side the approver moderates that is still open.
    /// A repeat approval returns the link unchanged.
    pub fn approve(&self, link_id: &str, approver_id: &str) -> Result<BridgeLink> {
        validate_id("link id", link_id)?;
        let current = self.load(link_id)?;
        let grant = SideGrant::resolve(self.rights.as_ref(), approver_id, &current)?;
        if !grant.any() {
            return Err(BridgeError::unauthorized("approver does not moderate either branch of this link"));
        }

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = BridgeLinkStore::new(&tx);
        let mut link = store
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))?;

        if link.status == LinkStatus::Rejected {
            return Err(ConflictKind::AlreadyResolved.into());
        }

        let now = Utc::now();
        let mut changed = false;
        for side in grant.sides() {
            changed |= link.approve_side(side, approver_id, now);
        }
        if !changed {
            tracing::debug!(link_id, approver = approver_id, "approval already recorded");
            return Ok(link);
        }

        store.update(&link)?;
        tx.commit()?;
        tracing::info!(link_id, approver = approver_id, status = %link.status, "bridge link approved");
        Ok(link)
    }

    /// Reject from either side. Drops primacy and any generation override;
    /// no other link is promoted in its place.
    pub fn reject(&self, link_id: &str, actor_id: &str, reason: Option<String>) -> Result<BridgeLink> {
        validate_id("link id", link_id)?;
        let current = self.load(link_id)?;
        let grant = SideGrant::resolve(self.rights.as_ref(), actor_id, &current)?;
        if !grant.any() {
            return Err(BridgeError::unauthorized("actor does not moderate either branch of this link"));
        }

        let mut conn = self.db.get_connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let store = BridgeLinkStore::new(&tx);
        let mut link = store
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))?;

        if link.status == LinkStatus::Rejected {
            return Ok(link);
        }

        let now = Utc::now();
        let was_primary = PrimacyEnforcer::clear_within(&tx, &mut link, now)?;
        link.status = LinkStatus::Rejected;
        link.display_generation_override = None;
        if reason.is_some() {
            link.notes = reason;
        }
        link.updated_at = now;
        store.update(&link)?;
        tx.commit()?;

        tracing::info!(link_id, actor = actor_id, was_primary, "bridge link rejected");
        Ok(link)
    }

    pub fn awaiting_side(link: &BridgeLink) -> AwaitingSide {
        link.awaiting_side()
    }

    fn load(&self, link_id: &str) -> Result<BridgeLink> {
        let conn = self.db.get_connection()?;
        BridgeLinkStore::new(&conn)
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))
    }
}
