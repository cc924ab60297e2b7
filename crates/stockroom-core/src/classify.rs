//! # Error Classification
//!
//! Buckets an error message into a coarse category by keyword matching.
//!
//! ## Rule Table
//! ```text
//! ┌───────┬────────────────┬──────────────────────────────────────────────────┐
//! │ Order │ Category       │ Keywords (case-insensitive substring)            │
//! ├───────┼────────────────┼──────────────────────────────────────────────────┤
//! │   1   │ Authentication │ auth, login, credentials, token, jwt, session,   │
//! │       │                │ unauthorized, password, email not confirmed      │
//! │   2   │ Database       │ database, relation, constraint, duplicate key,   │
//! │       │                │ foreign key, violates, column, sql, query, unique│
//! │   3   │ Network        │ network, fetch, timeout, connection, offline,    │
//! │       │                │ econnrefused                                     │
//! │   4   │ Validation     │ validation, invalid, required, must be, format   │
//! │   5   │ Storage        │ storage, bucket, upload, file, object            │
//! │   -   │ Unknown        │ (nothing matched)                                │
//! └───────┴────────────────┴──────────────────────────────────────────────────┘
//! ```
//!
//! The first matching rule wins, so "Invalid login credentials" is
//! Authentication even though "invalid" is also a Validation keyword.
//!
//! ## Caveat
//! This is a heuristic. A message that mentions "token" in an unrelated
//! context will still land in Authentication.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Authentication,
    Database,
    Network,
    Validation,
    Storage,
    Unknown,
}

impl ErrorCategory {
    /// Message shown when the error itself carries no text.
    pub const fn default_message(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "Authentication failed. Please sign in again.",
            ErrorCategory::Database => "A database error occurred. Please try again.",
            ErrorCategory::Network => "Network error. Please check your connection.",
            ErrorCategory::Validation => "Please check the form for errors.",
            ErrorCategory::Storage => "File storage error. Please try again.",
            ErrorCategory::Unknown => "An unexpected error occurred.",
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Database => "database",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, Copy)]
pub struct ClassificationRule {
    pub category: ErrorCategory,
    /// Lower-case keywords.
    pub keywords: &'static [&'static str],
}

/// Rules in evaluation order.
pub const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        category: ErrorCategory::Authentication,
        keywords: &[
            "auth",
            "login",
            "credentials",
            "token",
            "jwt",
            "session",
            "unauthorized",
            "password",
            "email not confirmed",
        ],
    },
    ClassificationRule {
        category: ErrorCategory::Database,
        keywords: &[
            "database",
            "relation",
            "constraint",
            "duplicate key",
            "foreign key",
            "violates",
            "column",
            "sql",
            "query",
            "unique",
        ],
    },
    ClassificationRule {
        category: ErrorCategory::Network,
        keywords: &[
            "network",
            "fetch",
            "timeout",
            "connection",
            "offline",
            "econnrefused",
        ],
    },
    ClassificationRule {
        category: ErrorCategory::Validation,
        keywords: &["validation", "invalid", "required", "must be", "format"],
    },
    ClassificationRule {
        category: ErrorCategory::Storage,
        keywords: &["storage", "bucket", "upload", "file", "object"],
    },
];

impl ClassificationRule {
    fn matches(&self, lowered: &str) -> bool {
        self.keywords.iter().any(|keyword| lowered.contains(keyword))
    }
}

/// Classifies a message against [`RULES`].
///
/// ## Example
/// ```rust
/// use stockroom_core::classify::{classify, ErrorCategory};
///
/// assert_eq!(classify("Invalid login credentials"), ErrorCategory::Authentication);
/// assert_eq!(classify("network request failed"), ErrorCategory::Network);
/// assert_eq!(classify("something odd happened"), ErrorCategory::Unknown);
/// ```
pub fn classify(message: &str) -> ErrorCategory {
    classify_with(RULES, message)
}

/// Classifies a message against a caller-supplied rule table.
pub fn classify_with(rules: &[ClassificationRule], message: &str) -> ErrorCategory {
    let lowered = message.to_lowercase();

    rules
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.category)
        .unwrap_or(ErrorCategory::Unknown)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_failure_is_authentication() {
        assert_eq!(
            classify("Invalid login credentials"),
            ErrorCategory::Authentication
        );
    }

    #[test]
    fn test_network_keyword() {
        assert_eq!(classify("A network error occurred"), ErrorCategory::Network);
        assert_eq!(classify("connect ECONNREFUSED 127.0.0.1"), ErrorCategory::Network);
    }

    #[test]
    fn test_no_match_is_unknown() {
        assert_eq!(classify("the cat sat on the mat"), ErrorCategory::Unknown);
        assert_eq!(classify(""), ErrorCategory::Unknown);
    }

    #[test]
    fn test_each_category_independently() {
        assert_eq!(
            classify("UNIQUE constraint failed: items.sku"),
            ErrorCategory::Database
        );
        assert_eq!(classify("name is required"), ErrorCategory::Validation);
        assert_eq!(classify("Bucket not found"), ErrorCategory::Storage);
        assert_eq!(classify("JWT expired"), ErrorCategory::Authentication);
    }

    #[test]
    fn test_rule_order_decides_overlaps() {
        // "query" (database) comes before "timeout" (network)
        assert_eq!(classify("query timeout"), ErrorCategory::Database);
        // "upload" is storage, but "fetch" (network) is checked first
        assert_eq!(classify("upload fetch failed"), ErrorCategory::Network);
    }

    #[test]
    fn test_custom_rule_table() {
        let rules = [ClassificationRule {
            category: ErrorCategory::Storage,
            keywords: &["disk"],
        }];
        assert_eq!(classify_with(&rules, "Disk full"), ErrorCategory::Storage);
        assert_eq!(classify_with(&rules, "network"), ErrorCategory::Unknown);
    }
}
