//! # stockroom-db: Database Layer for Stockroom
//!
//! SQLite storage for the inventory back office, accessed through `sqlx`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Data Flow                              │
//! │                                                                         │
//! │  Inventory::fetch_items / create_order / restore_backup                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  stockroom-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  item, order, │    │  (embedded)  │  │   │
//! │  │   │               │◄───│  customer,... │    │ 001_init.sql │  │   │
//! │  │   │  SqlitePool   │    └───────┬───────┘    └──────────────┘  │   │
//! │  │   │  ChangeFeed   │◄───────────┘ publish after every write     │   │
//! │  │   └───────────────┘                                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │          ~/.local/share/stockroom/stockroom.db (default)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`realtime`] - Change feed for cache invalidation
//! - [`repository`] - One repository per table
//! - [`backup`] - Whole-database export and restore
//! - [`seed`] - Demo data for development
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockroom_core::{ItemFilter, PageRequest};
//! use stockroom_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("stockroom.db")).await?;
//! let page = db.items().list(&ItemFilter::default(), PageRequest::default()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod realtime;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use backup::RestoreReport;
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, Table};
pub use seed::SeedReport;

// Repository re-exports for convenience
pub use repository::{
    AuditRepository, CustomerRepository, DashboardRepository, ItemRepository, NewUser,
    NotificationRepository, OrderRepository, OrganizationRepository, PasswordReset,
    SettingsDefaults, SettingsRepository, StoredCredentials, SystemLogRepository, UserRepository,
    WarehouseRepository,
};
