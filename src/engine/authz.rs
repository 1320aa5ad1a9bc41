//! Moderation Rights
//!
//! The single capability check every bridge operation goes through. Role
//! storage is owned by the membership system; this module only reads it.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::engine::bridge::model::{BridgeLink, Side};
use crate::engine::database::Database;
use crate::engine::error::{BridgeError, Result};

/// Global roles that may act on any branch
const ELEVATED_ROLES: &[&str] = &["ADMIN", "SUPER_GURU"];

/// Branch membership roles that may moderate that branch
const MODERATOR_ROLES: &[&str] = &["guru", "moderator"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationRole {
    None,
    Moderator,
    Elevated,
}

impl ModerationRole {
    pub fn can_moderate(self) -> bool {
        self >= ModerationRole::Moderator
    }

    pub fn is_elevated(self) -> bool {
        self == ModerationRole::Elevated
    }
}

pub trait ModerationRights: Send + Sync {
    fn check_moderation_rights(&self, user_id: &str, branch_id: &str) -> Result<ModerationRole>;
}

/// What an actor may do on each side of one link
#[derive(Debug, Clone, Copy)]
pub struct SideGrant {
    pub source: ModerationRole,
    pub target: ModerationRole,
}

impl SideGrant {
    pub fn resolve(rights: &dyn ModerationRights, actor_id: &str, link: &BridgeLink) -> Result<Self> {
        Ok(Self {
            source: rights.check_moderation_rights(actor_id, &link.source_branch_id)?,
            target: rights.check_moderation_rights(actor_id, &link.target_branch_id)?,
        })
    }

    /// Sides the actor may approve or reject, source first
    pub fn sides(&self) -> Vec<Side> {
        let mut sides = Vec::with_capacity(2);
        if self.source.can_moderate() {
            sides.push(Side::Source);
        }
        if self.target.can_moderate() {
            sides.push(Side::Target);
        }
        sides
    }

    pub fn any(&self) -> bool {
        self.source.can_moderate() || self.target.can_moderate()
    }

    pub fn is_elevated(&self) -> bool {
        self.source.is_elevated() || self.target.is_elevated()
    }
}

pub fn require_elevated(rights: &dyn ModerationRights, actor_id: &str, branch_id: &str) -> Result<()> {
    if rights.check_moderation_rights(actor_id, branch_id)?.is_elevated() {
        Ok(())
    } else {
        Err(BridgeError::unauthorized("only elevated admins can manage primary bridges and generation overrides"))
    }
}

/// Rights read from the `users` and `branch_members` tables
#[derive(Clone)]
pub struct SqliteModerationRights {
    db: Database,
}

impl SqliteModerationRights {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl ModerationRights for SqliteModerationRights {
    fn check_moderation_rights(&self, user_id: &str, branch_id: &str) -> Result<ModerationRole> {
        let conn = self.db.get_connection()?;

        let global_role: Option<String> = conn
            .query_row(
                "SELECT global_role FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(global_role) = global_role else {
            return Ok(ModerationRole::None);
        };
        if ELEVATED_ROLES.contains(&global_role.as_str()) {
            return Ok(ModerationRole::Elevated);
        }

        let membership: Option<(String, String)> = conn
            .query_row(
                "SELECT role, status FROM branch_members WHERE branch_id = ?1 AND user_id = ?2",
                params![branch_id, user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(match membership {
            Some((role, status)) if status == "active" && MODERATOR_ROLES.contains(&role.as_str()) => {
                ModerationRole::Moderator
            }
            _ => ModerationRole::None,
        })
    }
}
