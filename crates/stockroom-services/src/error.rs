//! # Service Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Service Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Domain        │  │   Storage       │  │   Configuration         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  Storage        │  │  InvalidConfig          │ │
//! │  │  Core           │  │  UploadFailed   │  │  ConfigLoadFailed       │ │
//! │  │  Database       │  │  Timeout        │  │  ConfigSaveFailed       │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │   Auth          │   Display text is what the error handler           │
//! │  │                 │   classifies, so messages keep their keywords      │
//! │  │  Auth           │   ("Invalid login credentials", "upload", ...).    │
//! │  │  Unauthorized   │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use stockroom_core::classify::classify;
use stockroom_core::{CoreError, ErrorCategory, ValidationError};
use stockroom_db::DbError;
use thiserror::Error;

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Message for every failed sign-in, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Invalid login credentials";

#[derive(Debug, Error)]
pub enum ServiceError {
    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Input rejected before touching the database.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DbError),

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    /// Sign-in, sign-up or reset failed. The text is shown to the user.
    #[error("{0}")]
    Auth(String),

    /// Missing, expired or tampered session token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    #[error("Storage error: {0}")]
    Storage(String),

    /// Every attempt failed.
    #[error("Upload failed after {attempts} attempts: {last_error}")]
    UploadFailed { attempts: u32, last_error: String },

    /// A single attempt ran out of time.
    #[error("Upload attempt timeout after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn invalid_credentials() -> Self {
        ServiceError::Auth(INVALID_CREDENTIALS.to_string())
    }

    /// Category the error handler files this error under.
    pub fn category(&self) -> ErrorCategory {
        classify(&self.to_string())
    }

    /// True for the not-found case of the underlying repository.
    pub fn is_not_found(&self) -> bool {
        match self {
            ServiceError::Database(e) => e.is_not_found(),
            _ => false,
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ServiceError {
    fn from(err: toml::ser::Error) -> Self {
        ServiceError::ConfigSaveFailed(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_follow_messages() {
        assert_eq!(
            ServiceError::invalid_credentials().category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            ServiceError::Validation(ValidationError::required("name")).category(),
            ErrorCategory::Validation
        );
        assert_eq!(
            ServiceError::Database(DbError::UniqueViolation {
                field: "sku".to_string()
            })
            .category(),
            ErrorCategory::Database
        );
        assert_eq!(
            ServiceError::UploadFailed {
                attempts: 3,
                last_error: "bucket full".to_string()
            }
            .category(),
            ErrorCategory::Storage
        );
        assert_eq!(ServiceError::Timeout(30).category(), ErrorCategory::Network);
    }

    #[test]
    fn test_not_found() {
        let err: ServiceError = DbError::not_found("Item", "i-1").into();
        assert!(err.is_not_found());
        assert!(!ServiceError::invalid_credentials().is_not_found());
    }
}
