//! Dataset Import
//!
//! Loads branches, persons, partnerships, users and memberships from a JSON
//! file. Stands in for the family-data service when running locally.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::engine::database::{Database, DatabaseError};
use crate::engine::directory::{Branch, Partnership, Person};
use crate::engine::error::{check_id, ValidationKind};

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Invalid dataset format: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] ValidationKind),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub full_name: String,
    #[serde(default = "default_global_role")]
    pub global_role: String,
}

fn default_global_role() -> String {
    "MEMBER".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    pub branch_id: String,
    pub user_id: String,
    pub role: String,
    #[serde(default = "default_member_status")]
    pub status: String,
}

fn default_member_status() -> String {
    "active".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    #[serde(default)]
    pub branches: Vec<Branch>,
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub partnerships: Vec<Partnership>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub members: Vec<MemberRecord>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub branches: usize,
    pub persons: usize,
    pub partnerships: usize,
    pub users: usize,
    pub members: usize,
}

impl Dataset {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Every id must pass the same rule the bridge operations enforce,
    /// otherwise the record could be imported but never linked
    pub fn validate(&self) -> Result<(), DatasetError> {
        for branch in &self.branches {
            check_id("branch id", &branch.id)?;
        }
        for person in &self.persons {
            check_id("person id", &person.id)?;
            check_id("branch id", &person.branch_id)?;
            for parent in [&person.father_id, &person.mother_id].into_iter().flatten() {
                check_id("parent id", parent)?;
            }
        }
        for partnership in &self.partnerships {
            check_id("partnership id", &partnership.id)?;
            check_id("branch id", &partnership.branch_id)?;
            check_id("person id", &partnership.person1_id)?;
            check_id("person id", &partnership.person2_id)?;
        }
        for user in &self.users {
            check_id("user id", &user.id)?;
        }
        for member in &self.members {
            check_id("branch id", &member.branch_id)?;
            check_id("user id", &member.user_id)?;
        }
        Ok(())
    }

    /// Validate, then upsert everything in one transaction
    pub fn apply(&self, db: &Database) -> Result<ImportSummary, DatasetError> {
        self.validate()?;
        let mut conn = db.get_connection()?;
        let tx = conn.transaction()?;

        for branch in &self.branches {
            tx.execute(
                "INSERT INTO branches (branch_id, surname, total_generations)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(branch_id) DO UPDATE SET
                    surname = excluded.surname,
                    total_generations = excluded.total_generations",
                params![branch.id, branch.surname, branch.total_generations],
            )?;
        }

        for person in &self.persons {
            tx.execute(
                "INSERT INTO persons
                 (person_id, branch_id, full_name, given_name, surname, generation_number, father_id, mother_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(person_id) DO UPDATE SET
                    branch_id = excluded.branch_id,
                    full_name = excluded.full_name,
                    given_name = excluded.given_name,
                    surname = excluded.surname,
                    generation_number = excluded.generation_number,
                    father_id = excluded.father_id,
                    mother_id = excluded.mother_id",
                params![
                    person.id,
                    person.branch_id,
                    person.full_name,
                    person.given_name,
                    person.surname,
                    person.generation_number,
                    person.father_id,
                    person.mother_id,
                ],
            )?;
        }

        for partnership in &self.partnerships {
            tx.execute(
                "INSERT INTO partnerships
                 (partnership_id, branch_id, person1_id, person2_id, status, order_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(partnership_id) DO UPDATE SET
                    branch_id = excluded.branch_id,
                    person1_id = excluded.person1_id,
                    person2_id = excluded.person2_id,
                    status = excluded.status,
                    order_number = excluded.order_number",
                params![
                    partnership.id,
                    partnership.branch_id,
                    partnership.person1_id,
                    partnership.person2_id,
                    partnership.status,
                    partnership.order_number,
                ],
            )?;
        }

        for user in &self.users {
            tx.execute(
                "INSERT INTO users (user_id, full_name, global_role) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                    full_name = excluded.full_name,
                    global_role = excluded.global_role",
                params![user.id, user.full_name, user.global_role],
            )?;
        }

        for member in &self.members {
            tx.execute(
                "INSERT INTO branch_members (branch_id, user_id, role, status)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(branch_id, user_id) DO UPDATE SET
                    role = excluded.role,
                    status = excluded.status",
                params![member.branch_id, member.user_id, member.role, member.status],
            )?;
        }

        tx.commit()?;

        let summary = ImportSummary {
            branches: self.branches.len(),
            persons: self.persons.len(),
            partnerships: self.partnerships.len(),
            users: self.users.len(),
            members: self.members.len(),
        };
        tracing::info!(?summary, "dataset imported");
        Ok(summary)
    }
}
