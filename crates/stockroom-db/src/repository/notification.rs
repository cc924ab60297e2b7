//! # Notification Repository
//!
//! A notification with no `user_id` is addressed to everyone, so a user's
//! view is their own rows plus the broadcast ones.

use chrono::Utc;
use sqlx::SqlitePool;
use stockroom_core::{Notification, NotificationFilter, NotificationInput, Page, PageRequest};
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

const VISIBLE_TO: &str = "(?1 IS NULL OR user_id = ?1 OR user_id IS NULL)";

#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        NotificationRepository { pool, feed }
    }

    /// Lists notifications, newest first.
    pub async fn list(
        &self,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> DbResult<Page<Notification>> {
        let page = page.normalized();
        debug!(?filter, page = page.page, "Listing notifications");

        let count_sql = format!(
            "SELECT COUNT(*) FROM notifications WHERE {VISIBLE_TO} AND (?2 = 0 OR is_read = 0)"
        );
        let count: i64 = sqlx::query_scalar(&count_sql)
            .bind(&filter.user_id)
            .bind(filter.unread_only)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT id, user_id, message, kind, is_read, created_at FROM notifications \
             WHERE {VISIBLE_TO} AND (?2 = 0 OR is_read = 0) \
             ORDER BY created_at DESC, id LIMIT ?3 OFFSET ?4"
        );
        let notifications = sqlx::query_as::<_, Notification>(&list_sql)
            .bind(&filter.user_id)
            .bind(filter.unread_only)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(notifications, count, page))
    }

    pub async fn get(&self, id: &str) -> DbResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "SELECT id, user_id, message, kind, is_read, created_at FROM notifications WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Notification", id))
    }

    pub async fn create(&self, input: &NotificationInput) -> DbResult<Notification> {
        let id = new_id();

        sqlx::query(
            "INSERT INTO notifications (id, user_id, message, kind, is_read, created_at) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        )
        .bind(&id)
        .bind(&input.user_id)
        .bind(input.message.trim())
        .bind(input.kind)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        self.feed.publish(Table::Notifications, ChangeKind::Insert, Some(&id));
        self.get(&id).await
    }

    pub async fn mark_read(&self, id: &str) -> DbResult<Notification> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        self.feed.publish(Table::Notifications, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    /// Marks everything visible to `user_id` as read. Returns rows changed.
    pub async fn mark_all_read(&self, user_id: Option<&str>) -> DbResult<u64> {
        let sql =
            format!("UPDATE notifications SET is_read = 1 WHERE {VISIBLE_TO} AND is_read = 0");
        let result = sqlx::query(&sql).bind(user_id).execute(&self.pool).await?;

        if result.rows_affected() > 0 {
            self.feed.publish(Table::Notifications, ChangeKind::Update, None);
        }
        Ok(result.rows_affected())
    }

    pub async fn unread_count(&self, user_id: Option<&str>) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM notifications WHERE {VISIBLE_TO} AND is_read = 0");
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Notification", id));
        }

        self.feed.publish(Table::Notifications, ChangeKind::Delete, Some(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;
    use stockroom_core::NotificationType;

    fn input(user_id: Option<&str>, message: &str) -> NotificationInput {
        NotificationInput {
            user_id: user_id.map(str::to_string),
            message: message.to_string(),
            kind: NotificationType::Warning,
        }
    }

    #[tokio::test]
    async fn test_visibility_and_unread() {
        let db = database().await;
        let repo = db.notifications();

        repo.create(&input(Some("u-1"), "Low stock: OIL-1L")).await.unwrap();
        repo.create(&input(Some("u-2"), "Someone else's")).await.unwrap();
        let broadcast = repo.create(&input(None, "Maintenance tonight")).await.unwrap();

        assert_eq!(repo.unread_count(Some("u-1")).await.unwrap(), 2);
        assert_eq!(repo.unread_count(None).await.unwrap(), 3);

        repo.mark_read(&broadcast.id).await.unwrap();
        let filter = NotificationFilter {
            user_id: Some("u-1".to_string()),
            unread_only: true,
        };
        let page = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].kind, NotificationType::Warning);
    }

    #[tokio::test]
    async fn test_mark_all_read() {
        let db = database().await;
        let repo = db.notifications();
        repo.create(&input(Some("u-1"), "one")).await.unwrap();
        repo.create(&input(None, "two")).await.unwrap();
        repo.create(&input(Some("u-2"), "three")).await.unwrap();

        assert_eq!(repo.mark_all_read(Some("u-1")).await.unwrap(), 2);
        assert_eq!(repo.unread_count(Some("u-1")).await.unwrap(), 0);
        assert_eq!(repo.unread_count(Some("u-2")).await.unwrap(), 1);
    }
}
