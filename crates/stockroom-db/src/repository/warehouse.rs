//! # Warehouse Repository
//!
//! `items_count` is not stored. Every read counts the warehouse's active
//! items in the same statement, so the number can never drift from the
//! items table.

use chrono::Utc;
use sqlx::SqlitePool;
use stockroom_core::{Page, PageRequest, Warehouse, WarehouseFilter, WarehouseInput};
use tracing::{debug, info};

use super::{new_id, search_pattern};
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

macro_rules! warehouse_select {
    () => {
        "SELECT w.id, w.name, w.location, w.created_at, w.updated_at, \
         (SELECT COUNT(*) FROM items i WHERE i.warehouse_id = w.id AND i.deleted_at IS NULL) \
         AS items_count \
         FROM warehouses w"
    };
}

/// Repository for warehouse database operations.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl WarehouseRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        WarehouseRepository { pool, feed }
    }

    /// Lists warehouses ordered by name. `search` matches name or location.
    pub async fn list(
        &self,
        filter: &WarehouseFilter,
        page: PageRequest,
    ) -> DbResult<Page<Warehouse>> {
        let page = page.normalized();
        let pattern = search_pattern(filter.search.as_deref());
        debug!(search = ?pattern, page = page.page, "Listing warehouses");

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM warehouses w
            WHERE (?1 IS NULL OR w.name LIKE ?1 ESCAPE '\' OR w.location LIKE ?1 ESCAPE '\')
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let warehouses = sqlx::query_as::<_, Warehouse>(concat!(
            warehouse_select!(),
            r#"
            WHERE (?1 IS NULL OR w.name LIKE ?1 ESCAPE '\' OR w.location LIKE ?1 ESCAPE '\')
            ORDER BY w.name COLLATE NOCASE, w.id
            LIMIT ?2 OFFSET ?3
            "#
        ))
        .bind(&pattern)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(warehouses, count, page))
    }

    /// All warehouses ordered by name, for dropdowns.
    pub async fn list_all(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(concat!(
            warehouse_select!(),
            " ORDER BY w.name COLLATE NOCASE, w.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(warehouses)
    }

    pub async fn get(&self, id: &str) -> DbResult<Warehouse> {
        sqlx::query_as::<_, Warehouse>(concat!(warehouse_select!(), " WHERE w.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Warehouse", id))
    }

    pub async fn create(&self, input: &WarehouseInput) -> DbResult<Warehouse> {
        let id = new_id();

        sqlx::query(
            "INSERT INTO warehouses (id, name, location, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?4)",
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(&input.location)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        info!(id = %id, name = %input.name, "Warehouse created");
        self.feed.publish(Table::Warehouses, ChangeKind::Insert, Some(&id));

        self.get(&id).await
    }

    pub async fn update(&self, id: &str, input: &WarehouseInput) -> DbResult<Warehouse> {
        let result = sqlx::query(
            "UPDATE warehouses SET name = ?2, location = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.location)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        self.feed.publish(Table::Warehouses, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    /// Deletes a warehouse. Its items stay, with `warehouse_id` cleared.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM warehouses WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Warehouse", id));
        }

        info!(id = %id, "Warehouse deleted");
        self.feed.publish(Table::Warehouses, ChangeKind::Delete, Some(id));
        // ON DELETE SET NULL touched the items too.
        self.feed.publish(Table::Items, ChangeKind::Update, None);
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM warehouses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, item_input, warehouse_input};

    #[tokio::test]
    async fn test_items_count_tracks_active_items() {
        let db = database().await;
        let warehouse = db.warehouses().create(&warehouse_input("Main")).await.unwrap();
        assert_eq!(warehouse.items_count, 0);

        let mut input = item_input("A-1");
        input.warehouse_id = Some(warehouse.id.clone());
        let a = db.items().create(&input).await.unwrap();
        input.sku = "A-2".to_string();
        db.items().create(&input).await.unwrap();

        assert_eq!(db.warehouses().get(&warehouse.id).await.unwrap().items_count, 2);

        db.items().trash(&a.id).await.unwrap();
        assert_eq!(db.warehouses().get(&warehouse.id).await.unwrap().items_count, 1);
    }

    #[tokio::test]
    async fn test_delete_detaches_items() {
        let db = database().await;
        let warehouse = db.warehouses().create(&warehouse_input("Old")).await.unwrap();

        let mut input = item_input("B-1");
        input.warehouse_id = Some(warehouse.id.clone());
        let item = db.items().create(&input).await.unwrap();

        db.warehouses().delete(&warehouse.id).await.unwrap();

        let item = db.items().get(&item.id).await.unwrap();
        assert_eq!(item.warehouse_id, None);
        assert!(db.warehouses().delete(&warehouse.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_search_and_update() {
        let db = database().await;
        let repo = db.warehouses();
        let north = repo.create(&warehouse_input("North depot")).await.unwrap();
        repo.create(&warehouse_input("South depot")).await.unwrap();

        let filter = WarehouseFilter {
            search: Some("north".to_string()),
        };
        let page = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);

        let renamed = repo
            .update(
                &north.id,
                &WarehouseInput {
                    name: "Tangier".to_string(),
                    location: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Tangier");
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
