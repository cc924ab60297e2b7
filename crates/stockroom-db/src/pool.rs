//! # Database Handle
//!
//! Opens the SQLite pool, owns the change feed and hands out repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Database Connection Pool                           │
//! │                                                                         │
//! │  DbConfig::new(path) ← Configure pool settings                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐   ┌──────────────────┐     │
//! │  │            SqlitePool                   │   │   ChangeFeed     │     │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐        │   │   (broadcast)    │     │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...    │   └────────▲─────────┘     │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘        │            │ publish       │
//! │  └─────────────────────────────────────────┘            │               │
//! │       │                                                 │               │
//! │       ▼                                                 │               │
//! │  db.items() / db.orders() / ...  ───────────────────────┘               │
//! │  (each repository holds a pool handle and a feed handle)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File databases use WAL so readers don't block the writer.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::realtime::{ChangeFeed, ChangeFilter, Subscription};
use crate::repository::{
    AuditRepository, CustomerRepository, DashboardRepository, ItemRepository,
    NotificationRepository, OrderRepository, OrganizationRepository, SettingsRepository,
    SystemLogRepository, UserRepository, WarehouseRepository,
};

/// Path used to request a private in-memory database.
const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the database.
///
/// ## Example
/// ```rust
/// use stockroom_db::DbConfig;
///
/// let config = DbConfig::new("/path/to/stockroom.db")
///     .max_connections(5)
///     .min_connections(1);
/// assert_eq!(config.max_connections, 5);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,

    /// Default: 5
    pub max_connections: u32,

    /// Connections opened eagerly. Default: 1
    pub min_connections: u32,

    /// How long to wait for a free connection. Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection. `None` keeps connections.
    /// Default: 10 minutes
    pub idle_timeout: Option<Duration>,

    /// Apply pending migrations when opening. Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// File-backed configuration. The file is created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
            run_migrations: true,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Disables automatic migrations on connect.
    pub fn skip_migrations(mut self) -> Self {
        self.run_migrations = false;
        self
    }

    /// Creates a configuration for an isolated in-memory database.
    ///
    /// ## Note
    /// An in-memory database lives as long as its single connection, so the
    /// pool holds exactly one and never lets it idle out.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
            run_migrations: true,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == MEMORY_PATH
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
                .journal_mode(SqliteJournalMode::Memory)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        // SQLite has foreign keys disabled by default for backwards compatibility
        Ok(options.foreign_keys(true))
    }
}

// =============================================================================
// Database
// =============================================================================

/// Shared handle to the pool and the change feed.
///
/// Cloning is cheap: clones share the pool and the change feed.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::in_memory()).await?;
/// let page = db.items().list(&ItemFilter::default(), PageRequest::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Database {
    /// Opens the pool.
    ///
    /// ## Steps
    /// 1. Build connect options (WAL for files, foreign keys always on)
    /// 2. Open the pool; an in-memory pool keeps its only connection forever
    /// 3. Apply migrations unless `skip_migrations` was set
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening database"
        );

        let connect_options = config.connect_options()?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(config.idle_timeout)
            .max_lifetime(if config.is_in_memory() {
                None
            } else {
                Some(Duration::from_secs(30 * 60))
            })
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Database pool created"
        );

        let db = Database {
            pool,
            feed: ChangeFeed::new(),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Raw pool, for the backup and seed modules.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// The change feed every repository publishes to.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Subscribes to row changes matching `filter`.
    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        self.feed.subscribe(filter)
    }

    pub fn items(&self) -> ItemRepository {
        ItemRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn warehouses(&self) -> WarehouseRepository {
        WarehouseRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn customers(&self) -> CustomerRepository {
        CustomerRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn orders(&self) -> OrderRepository {
        OrderRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn notifications(&self) -> NotificationRepository {
        NotificationRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn settings(&self) -> SettingsRepository {
        SettingsRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn audit_logs(&self) -> AuditRepository {
        AuditRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn system_logs(&self) -> SystemLogRepository {
        SystemLogRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn organizations(&self) -> OrganizationRepository {
        OrganizationRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone(), self.feed.clone())
    }

    pub fn dashboard(&self) -> DashboardRepository {
        DashboardRepository::new(self.pool.clone())
    }

    /// Closes the pool. Later queries fail with `ConnectionFailed`.
    pub async fn close(&self) {
        info!("Closing database pool");
        self.pool.close().await;
    }

    /// Checks if the database can execute queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        assert!(db.health_check().await);

        let (total, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert_eq!(total, applied);
    }

    #[tokio::test]
    async fn test_file_database_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stockroom.db");

        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        assert!(db.health_check().await);
        assert!(path.exists());
        db.close().await;
    }

    #[test]
    fn test_config_builder() {
        let config = DbConfig::new("/var/lib/stockroom/stockroom.db")
            .max_connections(10)
            .min_connections(2)
            .skip_migrations();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert!(!config.run_migrations);
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }
}
