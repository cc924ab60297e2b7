//! # Repository Module
//!
//! Database repository implementations for Stockroom.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Inventory (stockroom-services)                                         │
//! │       │                                                                 │
//! │       │  db.items().list(&filter, page)                                 │
//! │       ▼                                                                 │
//! │  ItemRepository                                                         │
//! │  ├── list(&self, filter, page)  → Page<Item>                            │
//! │  ├── create(&self, input)       → Item          ─┐                      │
//! │  ├── trash / restore / purge                     ├─▶ ChangeFeed         │
//! │  └── update(&self, id, input)   → Item          ─┘                      │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write publishes a [`ChangeEvent`](crate::realtime::ChangeEvent)
//! after it succeeds. Repositories do not validate input; callers run
//! `stockroom_core::validation` first.

pub mod audit;
pub mod customer;
pub mod dashboard;
pub mod item;
pub mod notification;
pub mod order;
pub mod organization;
pub mod settings;
pub mod user;
pub mod warehouse;

pub use audit::{AuditRepository, SystemLogRepository};
pub use customer::CustomerRepository;
pub use dashboard::DashboardRepository;
pub use item::ItemRepository;
pub use notification::NotificationRepository;
pub use order::OrderRepository;
pub use organization::OrganizationRepository;
pub use settings::{SettingsDefaults, SettingsRepository};
pub use user::{NewUser, PasswordReset, StoredCredentials, UserRepository};
pub use warehouse::WarehouseRepository;

use uuid::Uuid;

/// New primary key.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds a `LIKE ... ESCAPE '\'` pattern matching `term` anywhere.
///
/// ```text
/// "50%_off"  →  "%50\%\_off%"
/// ```
pub(crate) fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Trimmed, non-empty search term turned into a LIKE pattern.
pub(crate) fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern)
}

/// Shared fixture for repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use stockroom_core::{ItemInput, WarehouseInput};

    use crate::{Database, DbConfig};

    pub async fn database() -> Database {
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    pub fn item_input(sku: &str) -> ItemInput {
        ItemInput {
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            boxes: 2,
            units_per_box: 6,
            bought_price_cents: 1000,
            shipment_fees_cents: 150,
            selling_price_cents: 1500,
            quantity: 12,
            currency: "MAD".to_string(),
            ..Default::default()
        }
    }

    pub fn warehouse_input(name: &str) -> WarehouseInput {
        WarehouseInput {
            name: name.to_string(),
            location: Some("Casablanca".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("oil"), "%oil%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_blank_search_is_ignored() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some(" tea ")), Some("%tea%".to_string()));
    }
}
