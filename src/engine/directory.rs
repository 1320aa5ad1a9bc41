//! Branch Directory
//!
//! Read access to branches, persons and partnerships. These records are owned
//! by the surrounding application; this crate only reads them.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::engine::database::Database;
use crate::engine::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    pub surname: String,
    #[serde(default = "default_total_generations")]
    pub total_generations: i32,
}

fn default_total_generations() -> i32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    /// Home branch
    pub branch_id: String,
    pub full_name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub generation_number: Option<i32>,
    #[serde(default)]
    pub father_id: Option<String>,
    #[serde(default)]
    pub mother_id: Option<String>,
}

impl Person {
    /// Canonical generation, defaulting to 1 and never below it
    pub fn generation(&self) -> i32 {
        self.generation_number.unwrap_or(1).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartnershipStatus {
    Active,
    Ended,
    Annulled,
}

impl PartnershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartnershipStatus::Active => "active",
            PartnershipStatus::Ended => "ended",
            PartnershipStatus::Annulled => "annulled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(PartnershipStatus::Active),
            "ended" => Some(PartnershipStatus::Ended),
            "annulled" => Some(PartnershipStatus::Annulled),
            _ => None,
        }
    }
}

impl ToSql for PartnershipStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for PartnershipStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        PartnershipStatus::parse(text)
            .ok_or_else(|| FromSqlError::Other(format!("unknown partnership status {text:?}").into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partnership {
    pub id: String,
    pub branch_id: String,
    pub person1_id: String,
    pub person2_id: String,
    #[serde(default = "default_partnership_status")]
    pub status: PartnershipStatus,
    #[serde(default = "default_order_number")]
    pub order_number: i32,
}

fn default_partnership_status() -> PartnershipStatus {
    PartnershipStatus::Active
}

fn default_order_number() -> i32 {
    1
}

impl Partnership {
    pub fn partner_of(&self, person_id: &str) -> Option<&str> {
        if self.person1_id == person_id {
            Some(&self.person2_id)
        } else if self.person2_id == person_id {
            Some(&self.person1_id)
        } else {
            None
        }
    }
}

/// Read access to branch-scoped family data
pub trait BranchDirectory: Send + Sync {
    fn branch(&self, branch_id: &str) -> Result<Option<Branch>>;

    fn person(&self, person_id: &str) -> Result<Option<Person>>;

    fn persons(&self, branch_id: &str) -> Result<Vec<Person>>;

    fn partnerships(&self, branch_id: &str) -> Result<Vec<Partnership>>;

    /// Persons homed outside `outside_branch_id`, optionally filtered by a
    /// case-insensitive substring of the full name, ordered by full name
    fn search_persons(&self, outside_branch_id: &str, name_query: Option<&str>) -> Result<Vec<Person>>;
}

const PERSON_COLUMNS: &str =
    "person_id, branch_id, full_name, given_name, surname, generation_number, father_id, mother_id";

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        branch_id: row.get(1)?,
        full_name: row.get(2)?,
        given_name: row.get(3)?,
        surname: row.get(4)?,
        generation_number: row.get(5)?,
        father_id: row.get(6)?,
        mother_id: row.get(7)?,
    })
}

/// Directory backed by the local SQLite store
#[derive(Clone)]
pub struct SqliteBranchDirectory {
    db: Database,
}

impl SqliteBranchDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl BranchDirectory for SqliteBranchDirectory {
    fn branch(&self, branch_id: &str) -> Result<Option<Branch>> {
        let conn = self.db.get_connection()?;
        let branch = conn
            .query_row(
                "SELECT branch_id, surname, total_generations FROM branches WHERE branch_id = ?1",
                params![branch_id],
                |row| {
                    Ok(Branch {
                        id: row.get(0)?,
                        surname: row.get(1)?,
                        total_generations: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(branch)
    }

    fn person(&self, person_id: &str) -> Result<Option<Person>> {
        let conn = self.db.get_connection()?;
        let person = conn
            .query_row(
                &format!("SELECT {} FROM persons WHERE person_id = ?1", PERSON_COLUMNS),
                params![person_id],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn persons(&self, branch_id: &str) -> Result<Vec<Person>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM persons WHERE branch_id = ?1 ORDER BY person_id",
            PERSON_COLUMNS
        ))?;
        let persons = stmt
            .query_map(params![branch_id], person_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(persons)
    }

    fn partnerships(&self, branch_id: &str) -> Result<Vec<Partnership>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT partnership_id, branch_id, person1_id, person2_id, status, order_number
             FROM partnerships WHERE branch_id = ?1 ORDER BY partnership_id",
        )?;
        let partnerships = stmt
            .query_map(params![branch_id], |row| {
                Ok(Partnership {
                    id: row.get(0)?,
                    branch_id: row.get(1)?,
                    person1_id: row.get(2)?,
                    person2_id: row.get(3)?,
                    status: row.get(4)?,
                    order_number: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(partnerships)
    }

    fn search_persons(&self, outside_branch_id: &str, name_query: Option<&str>) -> Result<Vec<Person>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM persons
             WHERE branch_id <> ?1 AND (?2 IS NULL OR instr(lower(full_name), lower(?2)) > 0)
             ORDER BY full_name, person_id",
            PERSON_COLUMNS
        ))?;
        let persons = stmt
            .query_map(params![outside_branch_id, name_query], person_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(persons)
    }
}
