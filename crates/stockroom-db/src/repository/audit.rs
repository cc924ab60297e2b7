//! # Audit & System Log Repositories
//!
//! Append-only. `details` is stored as JSON text and parsed on read.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use stockroom_core::{AuditFilter, AuditLog, LogLevel, Page, PageRequest, SystemLog};
use tracing::debug;

use super::new_id;
use crate::error::DbResult;
use crate::realtime::{ChangeFeed, ChangeKind, Table};

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    user_id: Option<String>,
    action: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditLog {
    type Error = serde_json::Error;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(AuditLog {
            id: row.id,
            user_id: row.user_id,
            action: row.action,
            details: serde_json::from_str(&row.details)?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SystemRow {
    id: String,
    level: LogLevel,
    action: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SystemRow> for SystemLog {
    type Error = serde_json::Error;

    fn try_from(row: SystemRow) -> Result<Self, Self::Error> {
        Ok(SystemLog {
            id: row.id,
            level: row.level,
            action: row.action,
            details: serde_json::from_str(&row.details)?,
            created_at: row.created_at,
        })
    }
}

// =============================================================================
// Audit Log
// =============================================================================

#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        AuditRepository { pool, feed }
    }

    /// Appends an entry.
    pub async fn record(
        &self,
        user_id: Option<&str>,
        action: &str,
        details: serde_json::Value,
    ) -> DbResult<AuditLog> {
        let entry = AuditLog {
            id: new_id(),
            user_id: user_id.map(str::to_string),
            action: action.to_string(),
            details,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO audit_logs (id, user_id, action, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.action)
        .bind(serde_json::to_string(&entry.details)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        debug!(action = %action, user_id = ?user_id, "Audit entry recorded");
        self.feed.publish(Table::AuditLogs, ChangeKind::Insert, Some(&entry.id));
        Ok(entry)
    }

    /// Lists entries, newest first.
    pub async fn list(&self, filter: &AuditFilter, page: PageRequest) -> DbResult<Page<AuditLog>> {
        let page = page.normalized();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR action = ?2)",
        )
        .bind(&filter.user_id)
        .bind(&filter.action)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, user_id, action, details, created_at FROM audit_logs
            WHERE (?1 IS NULL OR user_id = ?1) AND (?2 IS NULL OR action = ?2)
            ORDER BY created_at DESC, id
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(&filter.user_id)
        .bind(&filter.action)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(AuditLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(entries, count, page))
    }
}

// =============================================================================
// System Log
// =============================================================================

#[derive(Debug, Clone)]
pub struct SystemLogRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SystemLogRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        SystemLogRepository { pool, feed }
    }

    pub async fn record(
        &self,
        level: LogLevel,
        action: &str,
        details: serde_json::Value,
    ) -> DbResult<SystemLog> {
        let entry = SystemLog {
            id: new_id(),
            level,
            action: action.to_string(),
            details,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO system_logs (id, level, action, details, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&entry.id)
        .bind(entry.level)
        .bind(&entry.action)
        .bind(serde_json::to_string(&entry.details)?)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        self.feed.publish(Table::SystemLogs, ChangeKind::Insert, Some(&entry.id));
        Ok(entry)
    }

    /// Lists entries, newest first, optionally at one level only.
    pub async fn list(
        &self,
        level: Option<LogLevel>,
        page: PageRequest,
    ) -> DbResult<Page<SystemLog>> {
        let page = page.normalized();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM system_logs WHERE (?1 IS NULL OR level = ?1)")
                .bind(level)
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query_as::<_, SystemRow>(
            r#"
            SELECT id, level, action, details, created_at FROM system_logs
            WHERE (?1 IS NULL OR level = ?1)
            ORDER BY created_at DESC, id
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(level)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(SystemLog::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(entries, count, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;
    use serde_json::json;

    #[tokio::test]
    async fn test_audit_details_round_trip() {
        let db = database().await;
        let repo = db.audit_logs();

        repo.record(Some("u-1"), "item.trash", json!({"item_id": "i-1", "sku": "OIL"}))
            .await
            .unwrap();
        repo.record(None, "backup.restore", json!({"items": 3}))
            .await
            .unwrap();

        let filter = AuditFilter {
            action: Some("item.trash".to_string()),
            ..Default::default()
        };
        let page = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].details["sku"], "OIL");
        assert_eq!(page.data[0].user_id.as_deref(), Some("u-1"));
    }

    #[tokio::test]
    async fn test_system_log_level_filter() {
        let db = database().await;
        let repo = db.system_logs();
        repo.record(LogLevel::Info, "startup", json!({})).await.unwrap();
        repo.record(LogLevel::Error, "upload.failed", json!({"attempts": 3}))
            .await
            .unwrap();

        let errors = repo
            .list(Some(LogLevel::Error), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(errors.count, 1);
        assert_eq!(errors.data[0].details["attempts"], 3);

        let all = repo.list(None, PageRequest::default()).await.unwrap();
        assert_eq!(all.count, 2);
    }
}
