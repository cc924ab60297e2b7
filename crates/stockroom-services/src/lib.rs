//! # stockroom-services: Application Services for Stockroom
//!
//! Everything the back office screens call sits here, on top of
//! `stockroom-db`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Services                               │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     AppServices (composition)                    │  │
//! │  │   built once from AppConfig, shared by Arc/Clone                 │  │
//! │  └───────────────┬─────────────────────────────────┬────────────────┘  │
//! │                  ▼                                 ▼                    │
//! │  ┌────────────────────────────────┐  ┌────────────────────────────┐    │
//! │  │          Inventory             │  │        AuthService         │    │
//! │  │                                │  │                            │    │
//! │  │ fetch_* ─▶ QueryCache          │  │ argon2 password hashes     │    │
//! │  │ writes  ─▶ mutate(prefixes)    │  │ HS256 session tokens       │    │
//! │  │ errors  ─▶ ErrorHandler        │  │ one-time reset tokens      │    │
//! │  │ images  ─▶ ImageUploader       │  │                            │    │
//! │  └────────────────┬───────────────┘  └──────────────┬─────────────┘    │
//! │                   └──────────────┬──────────────────┘                   │
//! │                                  ▼                                      │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │        stockroom-db (repositories, change feed, backup)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`inventory`] - Data access for every entity
//! - [`auth`] - Sign up, sign in, sessions and password resets
//! - [`cache`] - TTL + LRU query cache with an injectable clock
//! - [`error_log`] - Error classification, ring buffer and notifications
//! - [`upload`] - Object store and retrying image uploader
//! - [`config`] - `stockroom.toml` plus environment overrides
//! - [`error`] - Service error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod error_log;
pub mod inventory;
pub mod upload;

// =============================================================================
// Re-exports
// =============================================================================

pub use auth::{AuthOutcome, AuthRedirect, AuthService, JwtManager, Session};
pub use cache::{cache_key, Clock, ManualClock, QueryCache, SystemClock};
pub use config::AppConfig;
pub use error::{ServiceError, ServiceResult, INVALID_CREDENTIALS};
pub use error_log::{ErrorHandler, LogEntry, Notifier, TracingNotifier};
pub use inventory::Inventory;
pub use upload::{ImageUploader, LocalObjectStore, ObjectStore, RetryPolicy, UploadFile};

use std::sync::Arc;
use stockroom_db::{Database, DbConfig};
use tracing::info;

// =============================================================================
// Composition
// =============================================================================

/// The service graph for one process.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub config: AppConfig,
    pub db: Database,
    pub inventory: Inventory,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    /// Opens the configured database (running migrations) and wires the
    /// services to it.
    pub async fn connect(config: AppConfig) -> ServiceResult<Self> {
        config.validate()?;

        if let Some(parent) = config.database_path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let db = Database::new(
            DbConfig::new(config.database_path()).max_connections(config.database.max_connections),
        )
        .await?;

        Ok(Self::with_database(config, db))
    }

    /// Wires the services to an already open database.
    pub fn with_database(config: AppConfig, db: Database) -> Self {
        let inventory = Inventory::new(db.clone(), &config);
        let auth = Arc::new(AuthService::new(
            db.users(),
            &config.auth,
            Arc::clone(inventory.errors()),
        ));
        info!(path = %config.database_path().display(), "Services ready");

        AppServices {
            config,
            db,
            inventory,
            auth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("stockroom.db");
        config.storage.root = dir.path().join("uploads");

        let services = AppServices::connect(config).await.unwrap();
        assert!(services.db.health_check().await);
        assert!(dir.path().join("stockroom.db").exists());

        let session = services
            .auth
            .sign_up("owner@stockroom.ma", "s3cret-pass", None)
            .await
            .unwrap()
            .value;
        let profile = services.auth.verify(&session.access_token).await.unwrap();
        assert_eq!(profile.id, session.user.id);

        // Auth and inventory report to one error log.
        services
            .auth
            .sign_in("owner@stockroom.ma", "wrong-pass")
            .await
            .unwrap_err();
        let entry = &services.inventory.errors().get_recent(1)[0];
        assert_eq!(entry.category, stockroom_core::ErrorCategory::Authentication);

        services.db.close().await;
    }
}
