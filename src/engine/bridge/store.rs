//! Bridge Link Store
//!
//! Row mapping and queries for `bridge_links`. Works on any connection, so
//! callers decide the transaction scope.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

use super::model::{BranchPair, BridgeLink, LinkStatus};

const LINK_COLUMNS: &str = "link_id, person_id, source_branch_id, target_branch_id, status, requested_by,
    source_approved_by, source_approved_at, target_approved_by, target_approved_at,
    is_primary, primary_set_at, primary_set_by, display_name, notes,
    display_generation_override, created_at, updated_at";

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<BridgeLink> {
    Ok(BridgeLink {
        id: row.get(0)?,
        person_id: row.get(1)?,
        source_branch_id: row.get(2)?,
        target_branch_id: row.get(3)?,
        status: row.get(4)?,
        requested_by: row.get(5)?,
        source_approved_by: row.get(6)?,
        source_approved_at: row.get(7)?,
        target_approved_by: row.get(8)?,
        target_approved_at: row.get(9)?,
        is_primary: row.get(10)?,
        primary_set_at: row.get(11)?,
        primary_set_by: row.get(12)?,
        display_name: row.get(13)?,
        notes: row.get(14)?,
        display_generation_override: row.get(15)?,
        created_at: row.get(16)?,
        updated_at: row.get(17)?,
    })
}

pub struct BridgeLinkStore<'c> {
    conn: &'c Connection,
}

impl<'c> BridgeLinkStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    fn query(&self, filter: &str, params: &[&dyn rusqlite::ToSql]) -> rusqlite::Result<Vec<BridgeLink>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM bridge_links {}", LINK_COLUMNS, filter))?;
        let links = stmt
            .query_map(params, link_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(links)
    }

    pub fn insert(&self, link: &BridgeLink) -> rusqlite::Result<()> {
        let pair = link.pair();
        self.conn.execute(
            &format!(
                "INSERT INTO bridge_links ({}, pair_low, pair_high)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                LINK_COLUMNS
            ),
            params![
                link.id,
                link.person_id,
                link.source_branch_id,
                link.target_branch_id,
                link.status,
                link.requested_by,
                link.source_approved_by,
                link.source_approved_at,
                link.target_approved_by,
                link.target_approved_at,
                link.is_primary,
                link.primary_set_at,
                link.primary_set_by,
                link.display_name,
                link.notes,
                link.display_generation_override,
                link.created_at,
                link.updated_at,
                pair.low,
                pair.high,
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, link_id: &str) -> rusqlite::Result<Option<BridgeLink>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM bridge_links WHERE link_id = ?1", LINK_COLUMNS),
                params![link_id],
                link_from_row,
            )
            .optional()
    }

    /// Write back every mutable field. Person and branches never change.
    pub fn update(&self, link: &BridgeLink) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE bridge_links SET
                status = ?2,
                source_approved_by = ?3, source_approved_at = ?4,
                target_approved_by = ?5, target_approved_at = ?6,
                is_primary = ?7, primary_set_at = ?8, primary_set_by = ?9,
                display_name = ?10, notes = ?11,
                display_generation_override = ?12, updated_at = ?13
             WHERE link_id = ?1",
            params![
                link.id,
                link.status,
                link.source_approved_by,
                link.source_approved_at,
                link.target_approved_by,
                link.target_approved_at,
                link.is_primary,
                link.primary_set_at,
                link.primary_set_by,
                link.display_name,
                link.notes,
                link.display_generation_override,
                link.updated_at,
            ],
        )
    }

    pub fn delete(&self, link_id: &str) -> rusqlite::Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM bridge_links WHERE link_id = ?1", params![link_id])?;
        Ok(affected > 0)
    }

    /// Pending or approved link for this person between the pair, either direction
    pub fn find_active_for_person_pair(&self, person_id: &str, pair: &BranchPair) -> rusqlite::Result<Option<BridgeLink>> {
        let mut links = self.query(
            "WHERE person_id = ?1 AND pair_low = ?2 AND pair_high = ?3 AND status <> 'rejected'
             ORDER BY created_at LIMIT 1",
            &[&person_id, &pair.low, &pair.high],
        )?;
        Ok(links.pop())
    }

    pub fn list_for_pair(&self, pair: &BranchPair) -> rusqlite::Result<Vec<BridgeLink>> {
        self.query(
            "WHERE pair_low = ?1 AND pair_high = ?2 ORDER BY created_at, link_id",
            &[&pair.low, &pair.high],
        )
    }

    /// Links where the branch is either side, newest first
    pub fn list_for_branch(&self, branch_id: &str, status: Option<LinkStatus>) -> rusqlite::Result<Vec<BridgeLink>> {
        match status {
            Some(status) => self.query(
                "WHERE (source_branch_id = ?1 OR target_branch_id = ?1) AND status = ?2
                 ORDER BY created_at DESC, link_id",
                &[&branch_id, &status],
            ),
            None => self.query(
                "WHERE source_branch_id = ?1 OR target_branch_id = ?1
                 ORDER BY created_at DESC, link_id",
                &[&branch_id],
            ),
        }
    }

    pub fn list_approved_touching(&self, branch_id: &str) -> rusqlite::Result<Vec<BridgeLink>> {
        self.query(
            "WHERE (source_branch_id = ?1 OR target_branch_id = ?1) AND status = 'approved'
             ORDER BY created_at, link_id",
            &[&branch_id],
        )
    }

    pub fn list_active(&self) -> rusqlite::Result<Vec<BridgeLink>> {
        self.query(
            "WHERE status IN ('pending', 'approved') ORDER BY created_at, link_id",
            &[],
        )
    }

    pub fn list_for_person(&self, person_id: &str) -> rusqlite::Result<Vec<BridgeLink>> {
        self.query("WHERE person_id = ?1 ORDER BY created_at, link_id", &[&person_id])
    }

    /// Persons with a pending or approved link touching the branch
    pub fn linked_person_ids(&self, branch_id: &str) -> rusqlite::Result<HashSet<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT person_id FROM bridge_links
             WHERE (source_branch_id = ?1 OR target_branch_id = ?1) AND status <> 'rejected'",
        )?;
        let ids = stmt
            .query_map(params![branch_id], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }

    /// Clear primacy on every link of the pair except `keep_link_id`
    pub fn demote_pair(&self, pair: &BranchPair, keep_link_id: &str, at: DateTime<Utc>) -> rusqlite::Result<usize> {
        self.conn.execute(
            "UPDATE bridge_links
             SET is_primary = 0, primary_set_at = NULL, primary_set_by = NULL, updated_at = ?4
             WHERE pair_low = ?1 AND pair_high = ?2 AND link_id <> ?3 AND is_primary = 1",
            params![pair.low, pair.high, keep_link_id, at],
        )
    }

    pub fn count_by_status(&self) -> rusqlite::Result<Vec<(LinkStatus, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM bridge_links GROUP BY status ORDER BY status")?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(counts)
    }
}
