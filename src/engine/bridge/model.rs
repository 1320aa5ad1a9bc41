//! Bridge Link Records

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Approved,
    Rejected,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Approved => "approved",
            LinkStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LinkStatus::Pending),
            "approved" => Some(LinkStatus::Approved),
            "rejected" => Some(LinkStatus::Rejected),
            _ => None,
        }
    }

    /// Pending and approved links block a duplicate request
    pub fn is_active(&self) -> bool {
        !matches!(self, LinkStatus::Rejected)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for LinkStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LinkStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        LinkStatus::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown link status {text:?}").into()))
    }
}

/// One of the two branches a link joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AwaitingSide {
    Source,
    Target,
    None,
}

/// Unordered branch pair, stored low/high
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchPair {
    pub low: String,
    pub high: String,
}

impl BranchPair {
    pub fn new(a: &str, b: &str) -> Self {
        if a <= b {
            Self {
                low: a.to_string(),
                high: b.to_string(),
            }
        } else {
            Self {
                low: b.to_string(),
                high: a.to_string(),
            }
        }
    }

    pub fn pair_id(&self) -> String {
        format!("{}::{}", self.low, self.high)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeLink {
    pub id: String,
    pub person_id: String,
    pub source_branch_id: String,
    pub target_branch_id: String,
    pub status: LinkStatus,
    pub requested_by: String,
    pub source_approved_by: Option<String>,
    pub source_approved_at: Option<DateTime<Utc>>,
    pub target_approved_by: Option<String>,
    pub target_approved_at: Option<DateTime<Utc>>,
    pub is_primary: bool,
    pub primary_set_at: Option<DateTime<Utc>>,
    pub primary_set_by: Option<String>,
    pub display_name: Option<String>,
    pub notes: Option<String>,
    pub display_generation_override: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BridgeLink {
    /// A fresh pending link. The requester speaks for the source branch, so
    /// that side starts out approved.
    pub fn requested(person_id: &str, source_branch_id: &str, target_branch_id: &str, requested_by: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            person_id: person_id.to_string(),
            source_branch_id: source_branch_id.to_string(),
            target_branch_id: target_branch_id.to_string(),
            status: LinkStatus::Pending,
            requested_by: requested_by.to_string(),
            source_approved_by: Some(requested_by.to_string()),
            source_approved_at: Some(now),
            target_approved_by: None,
            target_approved_at: None,
            is_primary: false,
            primary_set_at: None,
            primary_set_by: None,
            display_name: None,
            notes: None,
            display_generation_override: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair(&self) -> BranchPair {
        BranchPair::new(&self.source_branch_id, &self.target_branch_id)
    }

    pub fn branch_for(&self, side: Side) -> &str {
        match side {
            Side::Source => &self.source_branch_id,
            Side::Target => &self.target_branch_id,
        }
    }

    pub fn touches(&self, branch_id: &str) -> bool {
        self.source_branch_id == branch_id || self.target_branch_id == branch_id
    }

    /// The branch on the far side from `branch_id`
    pub fn other_branch(&self, branch_id: &str) -> Option<&str> {
        if self.source_branch_id == branch_id {
            Some(&self.target_branch_id)
        } else if self.target_branch_id == branch_id {
            Some(&self.source_branch_id)
        } else {
            None
        }
    }

    pub fn is_side_approved(&self, side: Side) -> bool {
        match side {
            Side::Source => self.source_approved_by.is_some(),
            Side::Target => self.target_approved_by.is_some(),
        }
    }

    /// Record one side's approval and promote the link once both agree.
    /// Returns false when the side was already approved.
    pub fn approve_side(&mut self, side: Side, approver_id: &str, at: DateTime<Utc>) -> bool {
        if self.is_side_approved(side) {
            return false;
        }
        match side {
            Side::Source => {
                self.source_approved_by = Some(approver_id.to_string());
                self.source_approved_at = Some(at);
            }
            Side::Target => {
                self.target_approved_by = Some(approver_id.to_string());
                self.target_approved_at = Some(at);
            }
        }
        if self.is_side_approved(Side::Source) && self.is_side_approved(Side::Target) {
            self.status = LinkStatus::Approved;
        }
        self.updated_at = at;
        true
    }

    /// Derived from the approval fields every time; never stored
    pub fn awaiting_side(&self) -> AwaitingSide {
        if self.status != LinkStatus::Pending {
            return AwaitingSide::None;
        }
        match (self.is_side_approved(Side::Source), self.is_side_approved(Side::Target)) {
            (true, true) => AwaitingSide::None,
            (true, false) => AwaitingSide::Target,
            (false, _) => AwaitingSide::Source,
        }
    }

    /// When the link became fully approved
    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        if self.status != LinkStatus::Approved {
            return None;
        }
        self.target_approved_at
            .or(self.source_approved_at)
            .or(Some(self.updated_at))
    }
}
