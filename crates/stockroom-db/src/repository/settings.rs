//! # Settings Repository
//!
//! One row per user, created the first time it is read.

use chrono::Utc;
use sqlx::SqlitePool;
use stockroom_core::{BackupFrequency, Settings, SettingsUpdate, Theme};
use tracing::info;

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

const SETTINGS_COLUMNS: &str =
    "id, user_id, currency, language, theme, backup_frequency, created_at, updated_at";

/// Values a freshly created settings row starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsDefaults {
    pub currency: String,
    pub language: String,
}

impl Default for SettingsDefaults {
    fn default() -> Self {
        SettingsDefaults {
            currency: "MAD".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        SettingsRepository { pool, feed }
    }

    pub async fn find(&self, user_id: &str) -> DbResult<Option<Settings>> {
        let sql = format!("SELECT {SETTINGS_COLUMNS} FROM settings WHERE user_id = ?1");
        let settings = sqlx::query_as::<_, Settings>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(settings)
    }

    /// Returns the user's settings, inserting the default row if absent.
    ///
    /// `INSERT OR IGNORE` keeps two concurrent first reads from both
    /// creating a row.
    pub async fn get_or_create(
        &self,
        user_id: &str,
        defaults: &SettingsDefaults,
    ) -> DbResult<Settings> {
        if let Some(settings) = self.find(user_id).await? {
            return Ok(settings);
        }

        let id = new_id();
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO settings
                (id, user_id, currency, language, theme, backup_frequency, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(&defaults.currency)
        .bind(&defaults.language)
        .bind(Theme::default())
        .bind(BackupFrequency::default())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(user_id = %user_id, "Default settings created");
            self.feed.publish(Table::Settings, ChangeKind::Insert, Some(&id));
        }

        self.find(user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Settings", user_id))
    }

    /// Applies the fields present in `update`.
    pub async fn update(
        &self,
        user_id: &str,
        update: &SettingsUpdate,
        defaults: &SettingsDefaults,
    ) -> DbResult<Settings> {
        let current = self.get_or_create(user_id, defaults).await?;

        sqlx::query(
            r#"
            UPDATE settings
            SET currency = ?2, language = ?3, theme = ?4, backup_frequency = ?5, updated_at = ?6
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .bind(
            update
                .currency
                .as_deref()
                .map(|c| c.trim().to_ascii_uppercase())
                .unwrap_or(current.currency),
        )
        .bind(update.language.clone().unwrap_or(current.language))
        .bind(update.theme.unwrap_or(current.theme))
        .bind(update.backup_frequency.unwrap_or(current.backup_frequency))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.feed.publish(Table::Settings, ChangeKind::Update, Some(&current.id));

        self.find(user_id)
            .await?
            .ok_or_else(|| DbError::not_found("Settings", user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;

    #[tokio::test]
    async fn test_created_lazily_once() {
        let db = database().await;
        let repo = db.settings();
        assert!(repo.find("u-1").await.unwrap().is_none());

        let first = repo.get_or_create("u-1", &SettingsDefaults::default()).await.unwrap();
        let second = repo.get_or_create("u-1", &SettingsDefaults::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.theme, Theme::System);
        assert_eq!(first.currency, "MAD");
    }

    #[tokio::test]
    async fn test_partial_update() {
        let db = database().await;
        let repo = db.settings();
        let defaults = SettingsDefaults::default();

        let updated = repo
            .update(
                "u-1",
                &SettingsUpdate {
                    theme: Some(Theme::Dark),
                    currency: Some("eur".to_string()),
                    ..Default::default()
                },
                &defaults,
            )
            .await
            .unwrap();

        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(updated.currency, "EUR");
        assert_eq!(updated.language, "en");
        assert_eq!(updated.backup_frequency, BackupFrequency::Weekly);
    }
}
