//! # Error Types
//!
//! Domain-specific error types for stockroom-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Errors by crate                                     │
//! │                                                                         │
//! │  stockroom-core errors (this file)                                      │
//! │  ├── CoreError        - General domain errors                           │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  stockroom-db errors (separate crate)                                   │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  stockroom-services errors                                              │
//! │  └── ServiceError     - What callers of Inventory/AuthService see       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ServiceError → caller    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised by domain rules, independent of storage.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The item is not in a lifecycle state that allows the operation.
    ///
    /// ## When This Occurs
    /// - Restoring an item that is not in the trash
    /// - Trashing an item that is already trashed
    #[error("Item {id} is {state}, cannot perform operation")]
    InvalidItemState { id: String, state: String },

    /// Currency code is not one the formatter knows.
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    /// Locale tag is not one of en/fr/ar.
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    /// A backup document is malformed or incomplete.
    #[error("Invalid backup file: {0}")]
    InvalidBackup(String),

    /// A field check failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// A form field failed a check.
///
/// These are raised by the required-field checks that run before any
/// database call, so a rejected form never reaches the backend.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Missing, or only whitespace.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Below zero (quantities, prices).
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Malformed value such as an email or date.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Not one of a closed set (currencies, languages).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }
}

// =============================================================================
// Result
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_item_state_message() {
        let err = CoreError::InvalidItemState {
            id: "item-1".to_string(),
            state: "active".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Item item-1 is active, cannot perform operation"
        );
    }

    #[test]
    fn test_required_and_negative_messages() {
        let err = ValidationError::required("sku");
        assert_eq!(err.to_string(), "sku is required");

        let err = ValidationError::Negative {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must not be negative");
    }

    #[test]
    fn test_validation_error_wraps_into_core() {
        let core_err: CoreError = ValidationError::required("name").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
