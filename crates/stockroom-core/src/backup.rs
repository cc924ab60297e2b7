//! # Backup Document
//!
//! The JSON file written by "Export backup" and read by "Restore backup".
//!
//! ```text
//! {
//!   "timestamp": "2024-05-01T09:30:00Z",
//!   "items":    [ Item, ... ],
//!   "orders":   [ { ...Order, "items": [OrderItem, ...] }, ... ],
//!   "settings": { ...Settings } | null
//! }
//! ```
//!
//! Restore checks only that `items`, `orders` and `settings` are present.
//! There is no referential validation of the rows themselves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{Item, OrderWithItems, Settings};

/// Top-level keys a backup must contain.
pub const REQUIRED_KEYS: [&str; 3] = ["items", "orders", "settings"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub timestamp: DateTime<Utc>,
    pub items: Vec<Item>,
    pub orders: Vec<OrderWithItems>,
    /// Settings of the user who exported, if any.
    pub settings: Option<Settings>,
}

impl BackupDocument {
    pub fn new(items: Vec<Item>, orders: Vec<OrderWithItems>, settings: Option<Settings>) -> Self {
        BackupDocument {
            timestamp: Utc::now(),
            items,
            orders,
            settings,
        }
    }

    /// Parses a backup file.
    ///
    /// ## Errors
    /// - `InvalidBackup` if the text is not a JSON object
    /// - `InvalidBackup` naming the first missing key
    /// - `InvalidBackup` if a present key has the wrong shape
    pub fn parse(json: &str) -> CoreResult<Self> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| CoreError::InvalidBackup(format!("not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| CoreError::InvalidBackup("expected a JSON object".to_string()))?;

        if let Some(missing) = REQUIRED_KEYS.iter().find(|key| !object.contains_key(**key)) {
            return Err(CoreError::InvalidBackup(format!("missing \"{missing}\"")));
        }

        // Older exports carry no timestamp; stamp them with the restore time.
        let mut object = object.clone();
        object
            .entry("timestamp")
            .or_insert_with(|| serde_json::Value::String(Utc::now().to_rfc3339()));

        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| CoreError::InvalidBackup(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::InvalidBackup(e.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_rejected() {
        let err = BackupDocument::parse(r#"{"items": [], "orders": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "Invalid backup file: missing \"settings\"");
    }

    #[test]
    fn test_not_an_object() {
        assert!(matches!(
            BackupDocument::parse("[1, 2, 3]"),
            Err(CoreError::InvalidBackup(_))
        ));
        assert!(matches!(
            BackupDocument::parse("{oops"),
            Err(CoreError::InvalidBackup(_))
        ));
    }

    #[test]
    fn test_minimal_document() {
        let doc = BackupDocument::parse(r#"{"items": [], "orders": [], "settings": null}"#)
            .unwrap();
        assert!(doc.items.is_empty());
        assert!(doc.orders.is_empty());
        assert!(doc.settings.is_none());
    }

    #[test]
    fn test_export_then_parse() {
        let doc = BackupDocument::new(Vec::new(), Vec::new(), None);
        let json = doc.to_json_pretty().unwrap();
        let parsed = BackupDocument::parse(&json).unwrap();
        assert_eq!(parsed.timestamp, doc.timestamp);
    }
}
