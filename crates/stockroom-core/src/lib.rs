//! # stockroom-core: Pure Domain Logic for Stockroom
//!
//! This crate holds everything about the inventory back office that can be
//! expressed without touching a database, a file or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            Web Frontend (Items, Orders, Customers, ...)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │     stockroom-services (Inventory, AuthService, uploads)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ classify  │  │ validation│  │   │
//! │  │   │   Item    │  │  Money    │  │  rules    │  │  required │  │   │
//! │  │   │   Order   │  │  Locale   │  │ category  │  │  fields   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                stockroom-db (Database Layer)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Records (Item, Warehouse, Order, Customer, Settings, ...)
//! - [`money`] - Integer money plus currency/locale display formatting
//! - [`classify`] - Keyword rules that bucket error messages into categories
//! - [`pagination`] - Page requests and `total_pages` math
//! - [`validation`] - Required-field and format checks run before any write
//! - [`backup`] - The JSON backup document
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::money::format_currency;
//!
//! assert_eq!(format_currency(1234.5, "USD", "en"), "$1,234.50");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod classify;
pub mod error;
pub mod money;
pub mod pagination;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use backup::BackupDocument;
pub use classify::ErrorCategory;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Currency, Locale, Money};
pub use pagination::{Page, PageRequest};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Page size used when a caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Upper bound on page size; larger requests are clamped.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Number of handled errors kept in the in-memory error log.
pub const ERROR_LOG_CAPACITY: usize = 50;

/// Days a trashed item is kept before it becomes eligible for purging.
///
/// ## Note
/// Nothing purges on a timer. Purging is an explicit operation
/// (`Inventory::purge_expired_trash`, `stockroom-admin purge-trash`).
pub const TRASH_RETENTION_DAYS: i64 = 30;

/// Items at or below this quantity count as "low stock" on the dashboard.
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Folder used for item images when no folder is given.
pub const DEFAULT_UPLOAD_FOLDER: &str = "items";

/// Attempts made by the image uploader before giving up.
pub const DEFAULT_UPLOAD_RETRIES: u32 = 3;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_exports_cover_backup_and_pagination() {
        let json = r#"{"items": [], "orders": [], "settings": null}"#;
        let doc = BackupDocument::parse(json).unwrap();
        assert!(doc.items.is_empty());

        let page = PageRequest::new(1, MAX_PAGE_SIZE + 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }
}
