//! # Database Errors
//!
//! What can go wrong below the repositories, and how sqlx failures map
//! onto it.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Adds context and categorization                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceError (stockroom-services) ← Classified and logged              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller shows a transient notification                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Messages keep the SQLite wording ("UNIQUE constraint failed", "FOREIGN
//! KEY constraint failed") so keyword classification puts them under
//! Database.

use stockroom_core::CoreError;
use thiserror::Error;

/// Failure of a repository call.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row with that id (or not in the required state).
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - Purging an item that is not in the trash
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE column already holds the value.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Registering an email twice
    #[error("Duplicate {field}: UNIQUE constraint failed")]
    UniqueViolation { field: String },

    /// A referenced row is missing, or a row is still referenced.
    ///
    /// ## When This Occurs
    /// - Order line referencing a missing item
    /// - Purging an item that order lines still reference
    #[error("FOREIGN KEY constraint failed: {message}")]
    ForeignKeyViolation { message: String },

    /// Opening the pool failed, or the pool is closed.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// SQLite rejected the statement for another reason.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// No connection became free within the acquire timeout.
    #[error("Database connection pool exhausted")]
    PoolExhausted,

    /// A JSON column could not be encoded or decoded.
    #[error("Database column is not valid JSON: {0}")]
    InvalidJson(String),

    /// Domain rule rejected the operation (wrong item state, bad backup).
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// `NotFound` for `entity` with `id`.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

/// Maps sqlx failures, keeping SQLite's constraint wording.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → UniqueViolation / ForeignKeyViolation / QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // "UNIQUE constraint failed: <table>.<column>"
                if let Some(field) = msg.strip_prefix("UNIQUE constraint failed: ") {
                    DbError::UniqueViolation {
                        field: field.to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::InvalidJson(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;
    use stockroom_core::classify::{classify, ErrorCategory};

    #[test]
    fn test_constraint_messages_classify_as_database() {
        let err = DbError::UniqueViolation {
            field: "items.sku".to_string(),
        };
        assert_eq!(classify(&err.to_string()), ErrorCategory::Database);

        let err = DbError::ForeignKeyViolation {
            message: "FOREIGN KEY constraint failed".to_string(),
        };
        assert_eq!(classify(&err.to_string()), ErrorCategory::Database);
    }
}
