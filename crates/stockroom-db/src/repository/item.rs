//! # Item Repository
//!
//! Database operations for stock items, including the trash workflow.
//!
//! ## Soft Delete
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   trash(id)    UPDATE items SET deleted_at = now  WHERE deleted_at NULL │
//! │   restore(id)  UPDATE items SET deleted_at = NULL WHERE deleted_at SET  │
//! │   purge(id)    DELETE FROM items                  WHERE deleted_at SET  │
//! │                                                                         │
//! │   Only deleted_at changes, so a restored row equals the row before it   │
//! │   was trashed.                                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use stockroom_core::{
    CoreError, Item, ItemFilter, ItemInput, ItemSort, ItemState, Page, PageRequest, SortDirection,
};
use tracing::{debug, info, warn};

use super::{new_id, search_pattern};
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

/// Item columns with the warehouse name joined in.
macro_rules! item_select {
    () => {
        "SELECT i.id, i.sku, i.name, i.description, i.image_url, i.boxes, i.units_per_box, \
         i.bought_price_cents, i.shipment_fees_cents, i.selling_price_cents, i.quantity, \
         i.warehouse_id, w.name AS warehouse_name, i.currency, i.created_at, i.updated_at, \
         i.deleted_at \
         FROM items i LEFT JOIN warehouses w ON w.id = i.warehouse_id"
    };
}

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        ItemRepository { pool, feed }
    }

    /// Lists items matching `filter`, one page at a time.
    ///
    /// ## Filters
    /// - `state`: active (default) or trashed
    /// - `search`: case-insensitive match on sku or name
    /// - `warehouse_id`, `currency`: exact match
    /// - `low_stock`: quantity at or below the value
    pub async fn list(&self, filter: &ItemFilter, page: PageRequest) -> DbResult<Page<Item>> {
        let page = page.normalized();
        debug!(?filter, page = page.page, page_size = page.page_size, "Listing items");

        let mut count_query = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM items i");
        push_filters(&mut count_query, filter);
        let count: i64 = count_query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut query = QueryBuilder::<Sqlite>::new(item_select!());
        push_filters(&mut query, filter);
        query
            .push(" ORDER BY ")
            .push(sort_column(filter.sort))
            .push(match filter.direction {
                SortDirection::Asc => " ASC",
                SortDirection::Desc => " DESC",
            })
            .push(", i.id ASC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let items = query.build_query_as::<Item>().fetch_all(&self.pool).await?;

        debug!(count, returned = items.len(), "Items listed");
        Ok(Page::new(items, count, page))
    }

    /// Gets an item by ID, active or trashed.
    pub async fn get(&self, id: &str) -> DbResult<Item> {
        sqlx::query_as::<_, Item>(concat!(item_select!(), " WHERE i.id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Item", id))
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(concat!(item_select!(), " WHERE i.sku = ?1"))
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Every item including the trash, oldest first. Used by backups.
    pub async fn list_all(&self) -> DbResult<Vec<Item>> {
        let items =
            sqlx::query_as::<_, Item>(concat!(item_select!(), " ORDER BY i.created_at, i.id"))
                .fetch_all(&self.pool)
                .await?;
        Ok(items)
    }

    pub async fn create(&self, input: &ItemInput) -> DbResult<Item> {
        let id = new_id();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO items (
                id, sku, name, description, image_url, boxes, units_per_box,
                bought_price_cents, shipment_fees_cents, selling_price_cents, quantity,
                warehouse_id, currency, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)
            "#,
        )
        .bind(&id)
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.boxes)
        .bind(input.units_per_box)
        .bind(input.bought_price_cents)
        .bind(input.shipment_fees_cents)
        .bind(input.selling_price_cents)
        .bind(input.quantity)
        .bind(&input.warehouse_id)
        .bind(input.currency.trim().to_ascii_uppercase())
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(id = %id, sku = %input.sku, "Item created");
        self.feed.publish(Table::Items, ChangeKind::Insert, Some(&id));

        self.get(&id).await
    }

    /// Replaces the editable fields of an active item.
    ///
    /// ## Errors
    /// - `NotFound` if the item doesn't exist
    /// - `InvalidItemState` if the item is in the trash
    pub async fn update(&self, id: &str, input: &ItemInput) -> DbResult<Item> {
        self.require_state(id, ItemState::Active).await?;

        sqlx::query(
            r#"
            UPDATE items SET
                sku = ?2, name = ?3, description = ?4, image_url = ?5, boxes = ?6,
                units_per_box = ?7, bought_price_cents = ?8, shipment_fees_cents = ?9,
                selling_price_cents = ?10, quantity = ?11, warehouse_id = ?12,
                currency = ?13, updated_at = ?14
            WHERE id = ?1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(input.sku.trim())
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(&input.image_url)
        .bind(input.boxes)
        .bind(input.units_per_box)
        .bind(input.bought_price_cents)
        .bind(input.shipment_fees_cents)
        .bind(input.selling_price_cents)
        .bind(input.quantity)
        .bind(&input.warehouse_id)
        .bind(input.currency.trim().to_ascii_uppercase())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(id = %id, "Item updated");
        self.feed.publish(Table::Items, ChangeKind::Update, Some(id));

        self.get(id).await
    }

    /// Sets or clears the image URL of an item.
    pub async fn set_image_url(&self, id: &str, url: Option<&str>) -> DbResult<Item> {
        let result = sqlx::query("UPDATE items SET image_url = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(url)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        self.feed.publish(Table::Items, ChangeKind::Update, Some(id));
        self.get(id).await
    }

    /// Moves an active item to the trash.
    pub async fn trash(&self, id: &str) -> DbResult<Item> {
        self.require_state(id, ItemState::Active).await?;

        sqlx::query("UPDATE items SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        info!(id = %id, "Item moved to trash");
        self.feed.publish(Table::Items, ChangeKind::Update, Some(id));

        self.get(id).await
    }

    /// Brings a trashed item back.
    pub async fn restore(&self, id: &str) -> DbResult<Item> {
        self.require_state(id, ItemState::Trashed).await?;

        sqlx::query("UPDATE items SET deleted_at = NULL WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        info!(id = %id, "Item restored from trash");
        self.feed.publish(Table::Items, ChangeKind::Update, Some(id));

        self.get(id).await
    }

    /// Permanently deletes a trashed item.
    ///
    /// ## Errors
    /// - `NotFound` if there is no trashed item with this ID (active items
    ///   included)
    /// - `ForeignKeyViolation` if order lines still reference it
    pub async fn purge(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?1 AND deleted_at IS NOT NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Trashed item", id));
        }

        info!(id = %id, "Item purged");
        self.feed.publish(Table::Items, ChangeKind::Delete, Some(id));
        Ok(())
    }

    /// Purges every item trashed at or before `cutoff`.
    ///
    /// Items still referenced by orders are skipped with a warning.
    /// Returns the IDs that were purged.
    pub async fn purge_trashed_before(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<String>> {
        let candidates: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM items WHERE deleted_at IS NOT NULL AND deleted_at <= ?1 ORDER BY deleted_at",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let mut purged = Vec::with_capacity(candidates.len());
        for id in candidates {
            match self.purge(&id).await {
                Ok(()) => purged.push(id),
                Err(DbError::ForeignKeyViolation { .. }) => {
                    warn!(id = %id, "Trashed item is referenced by orders, not purged");
                }
                Err(e) => return Err(e),
            }
        }

        info!(count = purged.len(), cutoff = %cutoff, "Expired trash purged");
        Ok(purged)
    }

    /// Number of items in the given state.
    pub async fn count(&self, state: ItemState) -> DbResult<i64> {
        let sql = match state {
            ItemState::Active => "SELECT COUNT(*) FROM items WHERE deleted_at IS NULL",
            ItemState::Trashed => "SELECT COUNT(*) FROM items WHERE deleted_at IS NOT NULL",
        };
        let count: i64 = sqlx::query_scalar(sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn require_state(&self, id: &str, expected: ItemState) -> DbResult<Item> {
        let item = self.get(id).await?;
        if item.state() != expected {
            return Err(CoreError::InvalidItemState {
                id: id.to_string(),
                state: item.state().as_str().to_string(),
            }
            .into());
        }
        Ok(item)
    }
}

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ItemFilter) {
    query.push(match filter.state {
        ItemState::Active => " WHERE i.deleted_at IS NULL",
        ItemState::Trashed => " WHERE i.deleted_at IS NOT NULL",
    });

    if let Some(pattern) = search_pattern(filter.search.as_deref()) {
        query
            .push(" AND (i.sku LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR i.name LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }

    if let Some(warehouse_id) = &filter.warehouse_id {
        query
            .push(" AND i.warehouse_id = ")
            .push_bind(warehouse_id.clone());
    }

    if let Some(currency) = &filter.currency {
        query
            .push(" AND i.currency = ")
            .push_bind(currency.trim().to_ascii_uppercase());
    }

    if let Some(threshold) = filter.low_stock {
        query.push(" AND i.quantity <= ").push_bind(threshold);
    }
}

fn sort_column(sort: ItemSort) -> &'static str {
    match sort {
        ItemSort::CreatedAt => "i.created_at",
        ItemSort::Name => "i.name COLLATE NOCASE",
        ItemSort::Sku => "i.sku COLLATE NOCASE",
        ItemSort::Quantity => "i.quantity",
        ItemSort::SellingPrice => "i.selling_price_cents",
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeFilter;
    use crate::repository::test_support::{database, item_input, warehouse_input};
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = database().await;
        let created = db.items().create(&item_input("OIL-1L")).await.unwrap();

        let fetched = db.items().get(&created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.currency, "MAD");
        assert_eq!(fetched.state(), ItemState::Active);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_rejected() {
        let db = database().await;
        db.items().create(&item_input("OIL-1L")).await.unwrap();

        let err = db.items().create(&item_input("OIL-1L")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_trash_then_restore_round_trip() {
        let db = database().await;
        let repo = db.items();
        let original = repo.create(&item_input("TEA-250")).await.unwrap();

        let trashed = repo.trash(&original.id).await.unwrap();
        assert!(trashed.deleted_at.is_some());

        let restored = repo.restore(&original.id).await.unwrap();
        assert_eq!(restored, original);
        assert!(restored.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_state_guards() {
        let db = database().await;
        let repo = db.items();
        let item = repo.create(&item_input("SOAP")).await.unwrap();

        assert!(matches!(
            repo.restore(&item.id).await,
            Err(DbError::Core(CoreError::InvalidItemState { .. }))
        ));
        assert!(repo.purge(&item.id).await.unwrap_err().is_not_found());

        repo.trash(&item.id).await.unwrap();
        assert!(matches!(
            repo.trash(&item.id).await,
            Err(DbError::Core(CoreError::InvalidItemState { .. }))
        ));
        assert!(repo.update(&item.id, &item_input("SOAP")).await.is_err());

        repo.purge(&item.id).await.unwrap();
        assert!(repo.get(&item.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_filters_and_pagination() {
        let db = database().await;
        let repo = db.items();
        let warehouse = db.warehouses().create(&warehouse_input("Main")).await.unwrap();

        for i in 0..25 {
            let mut input = item_input(&format!("SKU-{i:02}"));
            input.quantity = i;
            if i % 5 == 0 {
                input.warehouse_id = Some(warehouse.id.clone());
            }
            repo.create(&input).await.unwrap();
        }

        let page = repo
            .list(&ItemFilter::default(), PageRequest::new(2, 10))
            .await
            .unwrap();
        assert_eq!(page.count, 25);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 10);

        let low = ItemFilter {
            low_stock: Some(4),
            ..Default::default()
        };
        assert_eq!(repo.list(&low, PageRequest::default()).await.unwrap().count, 5);

        let in_main = ItemFilter {
            warehouse_id: Some(warehouse.id.clone()),
            ..Default::default()
        };
        let page = repo.list(&in_main, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.data[0].warehouse_name.as_deref(), Some("Main"));

        let search = ItemFilter {
            search: Some("sku-2".to_string()),
            sort: ItemSort::Sku,
            direction: SortDirection::Asc,
            ..Default::default()
        };
        let page = repo.list(&search, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.data[0].sku, "SKU-20");
    }

    #[tokio::test]
    async fn test_trash_listing() {
        let db = database().await;
        let repo = db.items();
        let a = repo.create(&item_input("A-1")).await.unwrap();
        repo.create(&item_input("B-1")).await.unwrap();
        repo.trash(&a.id).await.unwrap();

        let active = repo.list(&ItemFilter::default(), PageRequest::default()).await.unwrap();
        let trash = repo.list(&ItemFilter::trashed(), PageRequest::default()).await.unwrap();
        assert_eq!(active.count, 1);
        assert_eq!(trash.count, 1);
        assert_eq!(trash.data[0].id, a.id);
        assert_eq!(repo.count(ItemState::Trashed).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_purge_trashed_before_cutoff() {
        let db = database().await;
        let repo = db.items();
        let item = repo.create(&item_input("OLD-1")).await.unwrap();
        repo.trash(&item.id).await.unwrap();

        let none = repo
            .purge_trashed_before(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert!(none.is_empty());

        let purged = repo
            .purge_trashed_before(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(purged, vec![item.id]);
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let db = database().await;
        let mut sub = db.subscribe(ChangeFilter::table(Table::Items));

        let item = db.items().create(&item_input("FEED-1")).await.unwrap();
        db.items().trash(&item.id).await.unwrap();

        let insert = sub.try_recv().unwrap();
        assert_eq!(insert.kind, ChangeKind::Insert);
        assert_eq!(insert.record_id.as_deref(), Some(item.id.as_str()));
        assert_eq!(sub.try_recv().unwrap().kind, ChangeKind::Update);
    }
}
