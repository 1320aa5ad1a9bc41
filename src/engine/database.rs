//! Rootbridge Database Module
//! SQLite adapter with connection pooling

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::engine::migrations::{MigrationRunner, MigrationStatus};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Schema migration failed: {0}")]
    Migration(String),
}

#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(configure_connection);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Single-connection in-memory database. Callers must never hold a
    /// connection while asking the pool for another one.
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let manager = SqliteConnectionManager::memory().with_init(configure_connection);
        let pool = Pool::builder()
            .max_size(1)
            .connection_timeout(Duration::from_secs(2))
            // The data lives in this one connection
            .idle_timeout(None)
            .max_lifetime(None)
            .build(manager)?;
        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        let mut conn = self.pool.get()?;

        // WAL lets tree reads proceed while a moderator action writes
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        let applied = MigrationRunner::embedded()
            .push(&mut conn)
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        if !applied.is_empty() {
            tracing::info!(count = applied.len(), "applied schema migrations");
        }
        Ok(())
    }

    pub fn get_connection(&self) -> Result<DbConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    pub fn migration_status(&self) -> Result<MigrationStatus, DatabaseError> {
        let conn = self.get_connection()?;
        MigrationRunner::embedded()
            .check(&conn)
            .map_err(|e| DatabaseError::Migration(e.to_string()))
    }

    /// Row counts for the tables the status command reports on.
    pub fn table_counts(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut counts = Vec::new();
        for table in ["branches", "persons", "partnerships", "bridge_links"] {
            let count: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            counts.push((table.to_string(), count));
        }
        Ok(counts)
    }
}

fn configure_connection(conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch("PRAGMA foreign_keys=ON")
}
