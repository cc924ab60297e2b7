//! # Organization Repository

use chrono::Utc;
use sqlx::SqlitePool;
use stockroom_core::{Organization, Page, PageRequest};
use tracing::info;

use super::{new_id, search_pattern};
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

#[derive(Debug, Clone)]
pub struct OrganizationRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl OrganizationRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        OrganizationRepository { pool, feed }
    }

    /// Lists organizations by name.
    pub async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> DbResult<Page<Organization>> {
        let page = page.normalized();
        let pattern = search_pattern(search);

        let count: i64 = sqlx::query_scalar(
            r"SELECT COUNT(*) FROM organizations WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\')",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let organizations = sqlx::query_as::<_, Organization>(
            r"SELECT id, name, created_at FROM organizations
              WHERE (?1 IS NULL OR name LIKE ?1 ESCAPE '\')
              ORDER BY name COLLATE NOCASE, id
              LIMIT ?2 OFFSET ?3",
        )
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(organizations, count, page))
    }

    pub async fn list_all(&self) -> DbResult<Vec<Organization>> {
        let organizations = sqlx::query_as::<_, Organization>(
            "SELECT id, name, created_at FROM organizations ORDER BY name COLLATE NOCASE, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(organizations)
    }

    pub async fn get(&self, id: &str) -> DbResult<Organization> {
        sqlx::query_as::<_, Organization>(
            "SELECT id, name, created_at FROM organizations WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Organization", id))
    }

    pub async fn create(&self, name: &str) -> DbResult<Organization> {
        let id = new_id();

        sqlx::query("INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&id)
            .bind(name.trim())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        info!(id = %id, name = %name.trim(), "Organization created");
        self.feed.publish(Table::Organizations, ChangeKind::Insert, Some(&id));
        self.get(&id).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> DbResult<Organization> {
        let result = sqlx::query("UPDATE organizations SET name = ?2 WHERE id = ?1")
            .bind(id)
            .bind(name.trim())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Organization", id));
        }

        self.feed.publish(Table::Organizations, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    /// Deletes an organization. Its members stay, unassigned.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM organizations WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Organization", id));
        }

        info!(id = %id, "Organization deleted");
        self.feed.publish(Table::Organizations, ChangeKind::Delete, Some(id));
        self.feed.publish(Table::Users, ChangeKind::Update, None);
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM organizations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;

    #[tokio::test]
    async fn test_create_rename_delete() {
        let db = database().await;
        let repo = db.organizations();

        let org = repo.create("  Atlas Group ").await.unwrap();
        assert_eq!(org.name, "Atlas Group");

        let renamed = repo.rename(&org.id, "Atlas Holdings").await.unwrap();
        assert_eq!(renamed.name, "Atlas Holdings");
        assert_eq!(renamed.created_at, org.created_at);

        repo.delete(&org.id).await.unwrap();
        assert!(repo.get(&org.id).await.unwrap_err().is_not_found());
        assert!(repo.delete(&org.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_sorted_by_name() {
        let db = database().await;
        let repo = db.organizations();
        repo.create("zeta").await.unwrap();
        repo.create("Alpha").await.unwrap();
        repo.create("beta").await.unwrap();

        let page = repo.list(None, PageRequest::default()).await.unwrap();
        let names: Vec<_> = page.data.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);

        let page = repo.list(Some("ET"), PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 2);
    }
}
