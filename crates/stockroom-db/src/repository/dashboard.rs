//! # Dashboard Repository
//!
//! Read-only aggregates computed in one round trip.

use sqlx::SqlitePool;
use stockroom_core::DashboardSummary;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct DashboardRepository {
    pool: SqlitePool,
}

impl DashboardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DashboardRepository { pool }
    }

    /// Computes the dashboard figures.
    ///
    /// ## Arguments
    /// * `low_stock_threshold` - active items with `quantity <=` this count
    ///   as low stock
    pub async fn summary(&self, low_stock_threshold: i64) -> DbResult<DashboardSummary> {
        let summary = sqlx::query_as::<_, DashboardSummary>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM items WHERE deleted_at IS NULL) AS total_items,
                (SELECT COALESCE(SUM(quantity), 0) FROM items WHERE deleted_at IS NULL) AS total_quantity,
                (SELECT COALESCE(SUM(selling_price_cents * quantity), 0)
                   FROM items WHERE deleted_at IS NULL) AS stock_value_cents,
                (SELECT COUNT(*) FROM items
                   WHERE deleted_at IS NULL AND quantity <= ?1) AS low_stock_count,
                (SELECT COUNT(*) FROM items WHERE deleted_at IS NOT NULL) AS trashed_count,
                (SELECT COUNT(*) FROM customers) AS total_customers,
                (SELECT COUNT(*) FROM warehouses) AS total_warehouses,
                (SELECT COUNT(*) FROM orders) AS total_orders,
                (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
                (SELECT COALESCE(SUM(total_amount_cents), 0)
                   FROM orders WHERE status <> 'cancelled') AS revenue_cents
            "#,
        )
        .bind(low_stock_threshold)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{database, item_input};
    use stockroom_core::{OrderInput, OrderLineInput, OrderStatus};

    #[tokio::test]
    async fn test_empty_database() {
        let db = database().await;
        let summary = db.dashboard().summary(10).await.unwrap();
        assert_eq!(summary, DashboardSummary::default());
    }

    #[tokio::test]
    async fn test_summary_figures() {
        let db = database().await;
        let a = db.items().create(&item_input("A")).await.unwrap();
        let mut big = item_input("B");
        big.quantity = 40;
        db.items().create(&big).await.unwrap();
        let gone = db.items().create(&item_input("C")).await.unwrap();
        db.items().trash(&gone.id).await.unwrap();

        let order = OrderInput {
            currency: "MAD".to_string(),
            items: vec![OrderLineInput {
                item_id: a.id.clone(),
                quantity: 2,
                price_cents: 1500,
            }],
            ..Default::default()
        };
        db.orders().create(&order).await.unwrap();
        let cancelled = db.orders().create(&order).await.unwrap();
        db.orders()
            .update_status(&cancelled.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let summary = db.dashboard().summary(12).await.unwrap();
        assert_eq!(summary.total_items, 2);
        assert_eq!(summary.total_quantity, 52);
        assert_eq!(summary.stock_value_cents, 52 * 1500);
        assert_eq!(summary.low_stock_count, 1);
        assert_eq!(summary.trashed_count, 1);
        assert_eq!(summary.total_orders, 2);
        assert_eq!(summary.pending_orders, 1);
        assert_eq!(summary.revenue_cents, 3000);
    }
}
