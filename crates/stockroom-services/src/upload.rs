//! # Image Upload
//!
//! Stores item images in an object store, retrying failed attempts with
//! exponential backoff.
//!
//! ## Retry Schedule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  attempt 1 ──fail──▶ wait 1s ──▶ attempt 2 ──fail──▶ wait 2s ──▶ ...    │
//! │                                                                         │
//! │  wait before attempt N (N ≥ 2) = base_delay · 2^(N-2), no jitter        │
//! │  exactly max_retries attempts, then UploadFailed { attempts, last }     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Objects are named `{folder}/{uuid}.{ext}` so uploads never overwrite
//! each other.

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageSettings;
use crate::error::{ServiceError, ServiceResult};

// =============================================================================
// Object Store
// =============================================================================

/// Where uploaded bytes end up.
#[async_trait]
pub trait ObjectStore: Send + Sync + fmt::Debug {
    /// Writes `bytes` at `path`, replacing any existing object.
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> ServiceResult<()>;

    /// Public URL of the object at `path`.
    fn public_url(&self, path: &str) -> String;
}

/// Object store backed by a local directory.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        LocalObjectStore {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(&settings.root, &settings.public_base_url)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> ServiceResult<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || path.is_empty() {
            return Err(ServiceError::Storage(format!("Invalid object path: {path}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, path: &str, bytes: &[u8], content_type: &str) -> ServiceResult<()> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        debug!(path, content_type, size = bytes.len(), "Object written");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), path)
    }
}

// =============================================================================
// Upload Request
// =============================================================================

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Original file name; only its extension is kept.
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        UploadFile {
            name: name.into(),
            bytes,
        }
    }

    /// Lower-cased extension, `bin` when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "bin".to_string())
    }

    pub fn content_type(&self) -> &'static str {
        match self.extension().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

/// `{folder}/{uuid}.{ext}` for a new object.
pub fn object_path(folder: &str, file: &UploadFile) -> String {
    let folder = folder.trim_matches('/');
    let name = format!("{}.{}", Uuid::new_v4().simple(), file.extension());
    if folder.is_empty() {
        name
    } else {
        format!("{folder}/{name}")
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Wait before the second attempt.
    pub base_delay: Duration,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: stockroom_core::DEFAULT_UPLOAD_RETRIES,
            base_delay: Duration::from_secs(1),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &StorageSettings) -> Self {
        RetryPolicy {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            attempt_timeout: settings.attempt_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Delay schedule: `base_delay`, then doubling, with no jitter.
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_secs(24 * 60 * 60),
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

// =============================================================================
// Uploader
// =============================================================================

#[derive(Debug, Clone)]
pub struct ImageUploader {
    store: Arc<dyn ObjectStore>,
    folder: String,
    policy: RetryPolicy,
}

impl ImageUploader {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        folder: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        ImageUploader {
            store,
            folder: folder.into(),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Uploads into the default folder with the configured attempt count.
    pub async fn upload(&self, file: &UploadFile) -> ServiceResult<String> {
        self.upload_with(file, &self.folder, self.policy.max_retries)
            .await
    }

    /// Uploads `file` under `folder`, trying at most `max_retries` times.
    ///
    /// ## Returns
    /// The public URL of the stored object.
    ///
    /// ## Errors
    /// `UploadFailed` carrying the last attempt's error once every attempt
    /// has failed.
    pub async fn upload_with(
        &self,
        file: &UploadFile,
        folder: &str,
        max_retries: u32,
    ) -> ServiceResult<String> {
        let max_retries = max_retries.max(1);
        let path = object_path(folder, file);
        let content_type = file.content_type();
        let mut schedule = self.policy.backoff();
        let mut last_error = String::new();

        for attempt in 1..=max_retries {
            if attempt > 1 {
                let delay = schedule.next_backoff().unwrap_or(self.policy.base_delay);
                debug!(attempt, ?delay, "Waiting before upload retry");
                tokio::time::sleep(delay).await;
            }

            match self.attempt(&path, &file.bytes, content_type).await {
                Ok(()) => {
                    let url = self.store.public_url(&path);
                    info!(path = %path, attempt, size = file.bytes.len(), "Image uploaded");
                    return Ok(url);
                }
                Err(e) => {
                    warn!(attempt, max_retries, error = %e, "Upload attempt failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(ServiceError::UploadFailed {
            attempts: max_retries,
            last_error,
        })
    }

    async fn attempt(&self, path: &str, bytes: &[u8], content_type: &str) -> ServiceResult<()> {
        match self.policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, self.store.put(path, bytes, content_type))
                .await
                .map_err(|_| ServiceError::Timeout(limit.as_secs()))?,
            None => self.store.put(path, bytes, content_type).await,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
