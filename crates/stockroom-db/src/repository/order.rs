//! # Order Repository
//!
//! Database operations for orders and their lines.
//!
//! ## Order Creation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT orders       (total = Σ price × quantity)                     │
//! │    INSERT order_items  (one row per line)                               │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any failing line rolls the whole order back.                           │
//! │  Stock quantities are NOT decremented.                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use stockroom_core::{
    Order, OrderFilter, OrderInput, OrderItem, OrderStatus, OrderWithItems, Page, PageRequest,
};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};
use crate::realtime::{ChangeFeed, ChangeKind, Table};

const ORDER_COLUMNS: &str =
    "id, customer_id, status, total_amount_cents, currency, notes, created_at, updated_at";

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool, feed: ChangeFeed) -> Self {
        OrderRepository { pool, feed }
    }

    /// Lists orders, newest first.
    ///
    /// ## Filters
    /// - `status`, `customer_id`: exact match
    /// - `created_from` / `created_to`: inclusive creation-time bounds
    pub async fn list(&self, filter: &OrderFilter, page: PageRequest) -> DbResult<Page<Order>> {
        let page = page.normalized();
        debug!(?filter, page = page.page, "Listing orders");

        const WHERE: &str = r#"
            WHERE (?1 IS NULL OR status = ?1)
              AND (?2 IS NULL OR customer_id = ?2)
              AND (?3 IS NULL OR created_at >= ?3)
              AND (?4 IS NULL OR created_at <= ?4)
        "#;

        let count_sql = format!("SELECT COUNT(*) FROM orders {WHERE}");
        let count: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.status)
            .bind(&filter.customer_id)
            .bind(filter.created_from)
            .bind(filter.created_to)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders {WHERE} ORDER BY created_at DESC, id LIMIT ?5 OFFSET ?6"
        );
        let orders = sqlx::query_as::<_, Order>(&list_sql)
            .bind(filter.status)
            .bind(&filter.customer_id)
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(orders, count, page))
    }

    /// Gets an order together with its lines.
    pub async fn get(&self, id: &str) -> DbResult<OrderWithItems> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))?;

        let items = self.lines(id).await?;
        Ok(OrderWithItems { order, items })
    }

    pub async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, item_id, quantity, price_cents FROM order_items WHERE order_id = ?1 ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Every order with its lines, oldest first. Used by backups.
    pub async fn list_all_with_items(&self) -> DbResult<Vec<OrderWithItems>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at, id");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(&self.pool)
            .await?;

        let lines = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, item_id, quantity, price_cents FROM order_items ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id.clone()).or_default().push(line);
        }

        Ok(orders
            .into_iter()
            .map(|order| {
                let items = by_order.remove(&order.id).unwrap_or_default();
                OrderWithItems { order, items }
            })
            .collect())
    }

    /// Creates an order and its lines in one transaction.
    pub async fn create(&self, input: &OrderInput) -> DbResult<OrderWithItems> {
        let id = new_id();
        let now = Utc::now();
        let total = input.total();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, total_amount_cents, currency, notes, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(&input.customer_id)
        .bind(input.status)
        .bind(total.cents())
        .bind(input.currency.trim().to_ascii_uppercase())
        .bind(&input.notes)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for line in &input.items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, item_id, quantity, price_cents) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(new_id())
            .bind(&id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.price_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(id = %id, lines = input.items.len(), total = %total, "Order created");
        self.feed.publish(Table::Orders, ChangeKind::Insert, Some(&id));

        self.get(&id).await
    }

    pub async fn update_status(&self, id: &str, status: OrderStatus) -> DbResult<OrderWithItems> {
        let result = sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(id = %id, status = status.as_str(), "Order status changed");
        self.feed.publish(Table::Orders, ChangeKind::Update, Some(id));

        self.get(id).await
    }

    /// Deletes an order; its lines go with it.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(id = %id, "Order deleted");
        self.feed.publish(Table::Orders, ChangeKind::Delete, Some(id));
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, item_input};
    use stockroom_core::{CustomerInput, OrderLineInput};

    async fn order_input(db: &crate::Database) -> OrderInput {
        let a = db.items().create(&item_input("ORD-A")).await.unwrap();
        let b = db.items().create(&item_input("ORD-B")).await.unwrap();
        OrderInput {
            currency: "mad".to_string(),
            items: vec![
                OrderLineInput {
                    item_id: a.id,
                    quantity: 3,
                    price_cents: 1500,
                },
                OrderLineInput {
                    item_id: b.id,
                    quantity: 1,
                    price_cents: 250,
                },
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_computes_total() {
        let db = database().await;
        let input = order_input(&db).await;

        let created = db.orders().create(&input).await.unwrap();
        assert_eq!(created.order.total_amount_cents, 4750);
        assert_eq!(created.order.status, OrderStatus::Pending);
        assert_eq!(created.order.currency, "MAD");
        assert_eq!(created.items.len(), 2);
        assert_eq!(created.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_create_does_not_touch_stock() {
        let db = database().await;
        let input = order_input(&db).await;
        let before = db.items().get(&input.items[0].item_id).await.unwrap();

        db.orders().create(&input).await.unwrap();

        let after = db.items().get(&input.items[0].item_id).await.unwrap();
        assert_eq!(after.quantity, before.quantity);
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back() {
        let db = database().await;
        let mut input = order_input(&db).await;
        input.items[1].item_id = "missing-item".to_string();

        let err = db.orders().create(&input).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_filters_and_status_update() {
        let db = database().await;
        let customer = db
            .customers()
            .create(&CustomerInput {
                name: "Rif Foods".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut input = order_input(&db).await;
        let first = db.orders().create(&input).await.unwrap();
        input.customer_id = Some(customer.id.clone());
        db.orders().create(&input).await.unwrap();

        db.orders()
            .update_status(&first.order.id, OrderStatus::Shipped)
            .await
            .unwrap();

        let shipped = OrderFilter {
            status: Some(OrderStatus::Shipped),
            ..Default::default()
        };
        let page = db.orders().list(&shipped, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].id, first.order.id);

        let for_customer = OrderFilter {
            customer_id: Some(customer.id),
            ..Default::default()
        };
        let page = db.orders().list(&for_customer, PageRequest::default()).await.unwrap();
        assert_eq!(page.count, 1);
    }

    #[tokio::test]
    async fn test_delete_cascades_lines() {
        let db = database().await;
        let input = order_input(&db).await;
        let created = db.orders().create(&input).await.unwrap();

        db.orders().delete(&created.order.id).await.unwrap();

        assert!(db.orders().lines(&created.order.id).await.unwrap().is_empty());
        assert!(db.orders().get(&created.order.id).await.unwrap_err().is_not_found());
    }
}
