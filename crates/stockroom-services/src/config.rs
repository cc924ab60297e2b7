//! # Application Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     STOCKROOM_DB_PATH=/srv/stockroom.db                                │
//! │     STOCKROOM_JWT_SECRET=...                                           │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/stockroom/stockroom.toml (Linux)                         │
//! │     ~/Library/Application Support/ma.Stockroom.stockroom/... (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     5 minute cache, 3 upload attempts, generated JWT secret            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/stockroom/stockroom.db"
//! max_connections = 5
//!
//! [cache]
//! ttl_secs = 300
//! capacity = 256
//!
//! [storage]
//! root = "/var/lib/stockroom/uploads"
//! public_base_url = "http://localhost:8080/storage"
//! max_retries = 3
//! base_delay_ms = 1000
//!
//! [auth]
//! jwt_secret = "change-me"
//! access_token_lifetime_secs = 3600
//!
//! [preferences]
//! locale = "fr"
//! currency = "MAD"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use stockroom_core::{
    Currency, Locale, DEFAULT_UPLOAD_FOLDER, DEFAULT_UPLOAD_RETRIES, LOW_STOCK_THRESHOLD,
    TRASH_RETENTION_DAYS,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

const CONFIG_FILE_NAME: &str = "stockroom.toml";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("stockroom.db"))
        .unwrap_or_else(|| PathBuf::from("stockroom.db"))
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a cached read stays fresh.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Entries kept before the least recently used is evicted.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_capacity() -> usize {
    256
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_secs: default_ttl_secs(),
            capacity: default_capacity(),
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory uploaded objects are written under.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// URL prefix objects are served from.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_folder")]
    pub folder: String,

    /// Total upload attempts, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait before the second attempt; doubles after each failure.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Per-attempt limit. Unset means attempts may take as long as they need.
    #[serde(default)]
    pub attempt_timeout_secs: Option<u64>,
}

fn default_storage_root() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("uploads"))
        .unwrap_or_else(|| PathBuf::from("uploads"))
}

fn default_public_base_url() -> String {
    "http://localhost:8080/storage".to_string()
}

fn default_folder() -> String {
    DEFAULT_UPLOAD_FOLDER.to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_UPLOAD_RETRIES
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            folder: default_folder(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            attempt_timeout_secs: None,
        }
    }
}

// =============================================================================
// Auth Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HS256 signing secret. Generated when absent, so sessions do not
    /// survive a restart unless it is configured.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,

    #[serde(default = "default_access_lifetime")]
    pub access_token_lifetime_secs: i64,

    #[serde(default = "default_reset_lifetime")]
    pub reset_token_lifetime_secs: i64,
}

fn default_jwt_secret() -> String {
    Uuid::new_v4().simple().to_string()
}

fn default_access_lifetime() -> i64 {
    3600
}

fn default_reset_lifetime() -> i64 {
    3600
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: default_jwt_secret(),
            access_token_lifetime_secs: default_access_lifetime(),
            reset_token_lifetime_secs: default_reset_lifetime(),
        }
    }
}

// =============================================================================
// Preferences
// =============================================================================

/// Defaults applied to new users and to formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default = "default_low_stock")]
    pub low_stock_threshold: i64,

    /// Days an item stays in the trash before `purge-trash` removes it.
    #[serde(default = "default_retention")]
    pub trash_retention_days: i64,
}

fn default_locale() -> String {
    Locale::default().tag().to_string()
}

fn default_currency() -> String {
    Currency::default().code().to_string()
}

fn default_low_stock() -> i64 {
    LOW_STOCK_THRESHOLD
}

fn default_retention() -> i64 {
    TRASH_RETENTION_DAYS
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            locale: default_locale(),
            currency: default_currency(),
            low_stock_threshold: default_low_stock(),
            trash_retention_days: default_retention(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub preferences: Preferences,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (stockroom.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ServiceResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ServiceError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file, creating parent directories.
    pub fn save(&self, config_path: Option<PathBuf>) -> ServiceResult<PathBuf> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ServiceError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ServiceError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ServiceError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Config saved");
        Ok(path)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.cache.ttl_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "cache.ttl_secs must be greater than 0".into(),
            ));
        }
        if self.cache.capacity == 0 {
            return Err(ServiceError::InvalidConfig(
                "cache.capacity must be greater than 0".into(),
            ));
        }
        if self.storage.max_retries == 0 {
            return Err(ServiceError::InvalidConfig(
                "storage.max_retries must be at least 1".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ServiceError::InvalidConfig(
                "database.max_connections must be greater than 0".into(),
            ));
        }
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ServiceError::InvalidConfig("auth.jwt_secret is empty".into()));
        }
        if self.auth.access_token_lifetime_secs <= 0 {
            return Err(ServiceError::InvalidConfig(
                "auth.access_token_lifetime_secs must be positive".into(),
            ));
        }

        self.locale()?;
        self.currency()?;

        Ok(())
    }

    /// Applies `STOCKROOM_*` overrides read through `lookup`.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("STOCKROOM_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(ttl) = lookup("STOCKROOM_CACHE_TTL_SECS") {
            match ttl.parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring non-numeric STOCKROOM_CACHE_TTL_SECS"),
            }
        }

        if let Some(root) = lookup("STOCKROOM_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(root);
        }

        if let Some(url) = lookup("STOCKROOM_PUBLIC_URL") {
            self.storage.public_base_url = url;
        }

        if let Some(secret) = lookup("STOCKROOM_JWT_SECRET") {
            debug!("Overriding JWT secret from environment");
            self.auth.jwt_secret = secret;
        }

        if let Some(locale) = lookup("STOCKROOM_LOCALE") {
            self.preferences.locale = locale;
        }

        if let Some(currency) = lookup("STOCKROOM_CURRENCY") {
            self.preferences.currency = currency;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn locale(&self) -> ServiceResult<Locale> {
        Ok(self.preferences.locale.parse()?)
    }

    pub fn currency(&self) -> ServiceResult<Currency> {
        Ok(self.preferences.currency.parse()?)
    }

    pub fn database_path(&self) -> &Path {
        &self.database.path
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("ma", "Stockroom", "stockroom")
}
