//! Rootbridge Migrations Module
//! Embedded schema migrations with a checksummed journal

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use thiserror::Error;

const JOURNAL_TABLE: &str = "_rootbridge_migrations";

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("SQL execution error: {0}")]
    SqlError(#[from] rusqlite::Error),
    #[error("Schema drift detected: {0}")]
    SchemaDrift(String),
}

#[derive(Debug, Clone)]
pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

impl Migration {
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sql.as_bytes());
        let result = hasher.finalize();
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, result)
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_family_tables",
        sql: "
            CREATE TABLE branches (
                branch_id TEXT PRIMARY KEY,
                surname TEXT NOT NULL,
                total_generations INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE persons (
                person_id TEXT PRIMARY KEY,
                branch_id TEXT NOT NULL REFERENCES branches(branch_id),
                full_name TEXT NOT NULL,
                given_name TEXT,
                surname TEXT,
                generation_number INTEGER,
                father_id TEXT,
                mother_id TEXT
            );
            CREATE INDEX idx_persons_branch ON persons(branch_id);

            CREATE TABLE partnerships (
                partnership_id TEXT PRIMARY KEY,
                branch_id TEXT NOT NULL REFERENCES branches(branch_id),
                person1_id TEXT NOT NULL,
                person2_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'ended', 'annulled')),
                order_number INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX idx_partnerships_branch ON partnerships(branch_id);

            CREATE TABLE users (
                user_id TEXT PRIMARY KEY,
                full_name TEXT NOT NULL,
                global_role TEXT NOT NULL DEFAULT 'MEMBER'
            );

            CREATE TABLE branch_members (
                branch_id TEXT NOT NULL REFERENCES branches(branch_id),
                user_id TEXT NOT NULL REFERENCES users(user_id),
                role TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'active',
                PRIMARY KEY (branch_id, user_id)
            );
        ",
    },
    Migration {
        name: "0002_bridge_links",
        sql: "
            CREATE TABLE bridge_links (
                link_id TEXT PRIMARY KEY,
                person_id TEXT NOT NULL,
                source_branch_id TEXT NOT NULL REFERENCES branches(branch_id),
                target_branch_id TEXT NOT NULL REFERENCES branches(branch_id),
                pair_low TEXT NOT NULL,
                pair_high TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'approved', 'rejected')),
                requested_by TEXT NOT NULL,
                source_approved_by TEXT,
                source_approved_at TEXT,
                target_approved_by TEXT,
                target_approved_at TEXT,
                is_primary INTEGER NOT NULL DEFAULT 0,
                primary_set_at TEXT,
                primary_set_by TEXT,
                display_name TEXT,
                notes TEXT,
                display_generation_override INTEGER
                    CHECK (display_generation_override IS NULL
                        OR display_generation_override BETWEEN 1 AND 30),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                CHECK (source_branch_id <> target_branch_id),
                CHECK (pair_low < pair_high)
            );
            CREATE INDEX idx_bridge_links_pair ON bridge_links(pair_low, pair_high);
            CREATE INDEX idx_bridge_links_person ON bridge_links(person_id);
            CREATE UNIQUE INDEX idx_bridge_links_one_primary
                ON bridge_links(pair_low, pair_high) WHERE is_primary = 1;
        ",
    },
];

pub struct MigrationRunner {
    migrations: &'static [Migration],
}

impl MigrationRunner {
    /// Runner over the migrations compiled into the binary
    pub fn embedded() -> Self {
        Self { migrations: MIGRATIONS }
    }

    fn ensure_journal(conn: &Connection) -> Result<(), MigrationError> {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    applied_at TEXT NOT NULL,
                    checksum TEXT NOT NULL
                )",
                JOURNAL_TABLE
            ),
            [],
        )?;
        Ok(())
    }

    fn recorded_checksum(conn: &Connection, name: &str) -> Result<Option<String>, MigrationError> {
        let checksum = conn
            .query_row(
                &format!("SELECT checksum FROM {} WHERE name = ?1", JOURNAL_TABLE),
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(checksum)
    }

    /// Apply every pending migration, each in its own transaction.
    /// Returns the names applied by this call.
    pub fn push(&self, conn: &mut Connection) -> Result<Vec<String>, MigrationError> {
        Self::ensure_journal(conn)?;
        let mut applied = Vec::new();

        for migration in self.migrations {
            match Self::recorded_checksum(conn, migration.name)? {
                Some(recorded) if recorded == migration.checksum() => continue,
                Some(_) => {
                    return Err(MigrationError::SchemaDrift(format!(
                        "{} was modified after it was applied",
                        migration.name
                    )))
                }
                None => {}
            }

            let tx = conn.transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                &format!(
                    "INSERT INTO {} (name, applied_at, checksum) VALUES (?1, ?2, ?3)",
                    JOURNAL_TABLE
                ),
                params![migration.name, Utc::now().to_rfc3339(), migration.checksum()],
            )?;
            tx.commit()?;
            applied.push(migration.name.to_string());
        }

        Ok(applied)
    }

    pub fn check(&self, conn: &Connection) -> Result<MigrationStatus, MigrationError> {
        Self::ensure_journal(conn)?;
        let mut status = MigrationStatus::default();

        for migration in self.migrations {
            match Self::recorded_checksum(conn, migration.name)? {
                Some(recorded) if recorded == migration.checksum() => status.applied_count += 1,
                Some(_) => status.drifted.push(migration.name.to_string()),
                None => {
                    status.pending_count += 1;
                    status.pending_migrations.push(migration.name.to_string());
                }
            }
        }

        Ok(status)
    }
}

#[derive(Debug, Default, serde::Serialize)]
pub struct MigrationStatus {
    pub applied_count: usize,
    pub pending_count: usize,
    pub pending_migrations: Vec<String>,
    pub drifted: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::embedded();

        let first = runner.push(&mut conn).unwrap();
        assert_eq!(first.len(), MIGRATIONS.len());
        assert!(runner.push(&mut conn).unwrap().is_empty());

        let status = runner.check(&conn).unwrap();
        assert_eq!(status.applied_count, MIGRATIONS.len());
        assert_eq!(status.pending_count, 0);
    }

    #[test]
    fn test_checksum_drift_detected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let runner = MigrationRunner::embedded();
        runner.push(&mut conn).unwrap();

        conn.execute(
            &format!("UPDATE {} SET checksum = 'tampered' WHERE name = ?1", JOURNAL_TABLE),
            params![MIGRATIONS[0].name],
        )
        .unwrap();

        assert!(matches!(runner.push(&mut conn), Err(MigrationError::SchemaDrift(_))));
        assert_eq!(runner.check(&conn).unwrap().drifted, vec![MIGRATIONS[0].name.to_string()]);
    }
}
