//! Bridge Error Types

use thiserror::Error;

use crate::engine::database::DatabaseError;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Validation failed: {0}")]
    Validation(ValidationKind),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Not authorized: {0}")]
    Authorization(String),

    #[error("Conflict: {0}")]
    Conflict(ConflictKind),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationKind {
    /// Holds the rejected value as written, which may not be an integer
    #[error("generation override {0} is out of range (1-30)")]
    OutOfRange(String),

    #[error("malformed {field}: {value:?}")]
    MalformedId { field: &'static str, value: String },

    #[error("a bridge link needs two different branches")]
    SameBranch,

    #[error("person {0} does not belong to either branch of the link")]
    PersonNotInPair(String),

    #[error("unknown link status: {0}")]
    UnknownStatus(String),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    #[error("this person is already linked between these branches")]
    AlreadyLinked,

    #[error("the link has already been rejected")]
    AlreadyResolved,

    #[error("only approved links can be made primary")]
    NotApproved,

    #[error("another primary bridge was assigned concurrently for this branch pair")]
    PrimacyRace,
}

pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        BridgeError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn unauthorized(reason: &str) -> Self {
        BridgeError::Authorization(reason.to_string())
    }
}

impl From<ValidationKind> for BridgeError {
    fn from(kind: ValidationKind) -> Self {
        BridgeError::Validation(kind)
    }
}

impl From<ConflictKind> for BridgeError {
    fn from(kind: ConflictKind) -> Self {
        BridgeError::Conflict(kind)
    }
}

const MAX_ID_LEN: usize = 64;

/// Ids are opaque, but must be short and URL-safe.
pub fn validate_id(field: &'static str, value: &str) -> Result<()> {
    Ok(check_id(field, value)?)
}

/// Same rule as [`validate_id`], for callers outside the bridge error type
pub fn check_id(field: &'static str, value: &str) -> std::result::Result<(), ValidationKind> {
    let well_formed = !value.is_empty()
        && value.len() <= MAX_ID_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if well_formed {
        Ok(())
    } else {
        Err(ValidationKind::MalformedId {
            field,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("link id", "3f2b8c1e-7a0d-4e55-9d0a-1b2c3d4e5f60").is_ok());
        assert!(validate_id("branch id", "branch_a").is_ok());
        assert!(validate_id("branch id", "").is_err());
        assert!(validate_id("branch id", "a b").is_err());
        assert!(validate_id("branch id", &"x".repeat(65)).is_err());
        assert!(validate_id("person id", "p.1").is_err());
        assert!(validate_id("person id", "b:x").is_err());
    }

    #[test]
    fn test_messages() {
        let err: BridgeError = ConflictKind::AlreadyLinked.into();
        assert_eq!(
            err.to_string(),
            "Conflict: this person is already linked between these branches"
        );
        let err = BridgeError::not_found("Link", "abc");
        assert_eq!(err.to_string(), "Link not found: abc");
    }
}
