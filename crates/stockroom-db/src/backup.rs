//! # Backup Export & Restore
//!
//! ## Restore Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BackupDocument::parse(json)     keys checked in stockroom-core         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │    upsert items         (unknown warehouse → NULL)                      │
//! │    upsert orders        (unknown customer  → NULL)                      │
//! │    replace order lines  (lines for unknown items are skipped)           │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ChangeFeed: items/orders updated                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Settings in the document are exported for reference but not restored.

use serde::Serialize;
use stockroom_core::BackupDocument;
use tracing::info;

use crate::error::DbResult;
use crate::pool::Database;
use crate::realtime::{ChangeKind, Table};

/// What a restore wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub items: u64,
    pub orders: u64,
    pub order_lines: u64,
    /// Lines dropped because their item is absent.
    pub skipped_lines: u64,
}

/// Builds a backup of every item (trashed included) and every order.
///
/// `user_id` selects whose settings are included.
pub async fn export(db: &Database, user_id: Option<&str>) -> DbResult<BackupDocument> {
    let items = db.items().list_all().await?;
    let orders = db.orders().list_all_with_items().await?;
    let settings = match user_id {
        Some(user_id) => db.settings().find(user_id).await?,
        None => None,
    };

    info!(
        items = items.len(),
        orders = orders.len(),
        "Backup exported"
    );
    Ok(BackupDocument::new(items, orders, settings))
}

/// Writes the document's items and orders back, overwriting rows with the
/// same id. Nothing is deleted.
pub async fn restore(db: &Database, document: &BackupDocument) -> DbResult<RestoreReport> {
    let mut report = RestoreReport::default();
    let mut tx = db.pool().begin().await?;

    for item in &document.items {
        sqlx::query(
            r#"
            INSERT INTO items (
                id, sku, name, description, image_url, boxes, units_per_box,
                bought_price_cents, shipment_fees_cents, selling_price_cents, quantity,
                warehouse_id, currency, created_at, updated_at, deleted_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                (SELECT id FROM warehouses WHERE id = ?12), ?13, ?14, ?15, ?16
            )
            ON CONFLICT(id) DO UPDATE SET
                sku = excluded.sku,
                name = excluded.name,
                description = excluded.description,
                image_url = excluded.image_url,
                boxes = excluded.boxes,
                units_per_box = excluded.units_per_box,
                bought_price_cents = excluded.bought_price_cents,
                shipment_fees_cents = excluded.shipment_fees_cents,
                selling_price_cents = excluded.selling_price_cents,
                quantity = excluded.quantity,
                warehouse_id = excluded.warehouse_id,
                currency = excluded.currency,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                deleted_at = excluded.deleted_at
            "#,
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.image_url)
        .bind(item.boxes)
        .bind(item.units_per_box)
        .bind(item.bought_price_cents)
        .bind(item.shipment_fees_cents)
        .bind(item.selling_price_cents)
        .bind(item.quantity)
        .bind(&item.warehouse_id)
        .bind(&item.currency)
        .bind(item.created_at)
        .bind(item.updated_at)
        .bind(item.deleted_at)
        .execute(&mut *tx)
        .await?;
        report.items += 1;
    }

    for entry in &document.orders {
        let order = &entry.order;
        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, status, total_amount_cents, currency, notes, created_at, updated_at)
            VALUES (?1, (SELECT id FROM customers WHERE id = ?2), ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                customer_id = excluded.customer_id,
                status = excluded.status,
                total_amount_cents = excluded.total_amount_cents,
                currency = excluded.currency,
                notes = excluded.notes,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&order.id)
        .bind(&order.customer_id)
        .bind(order.status)
        .bind(order.total_amount_cents)
        .bind(&order.currency)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;
        report.orders += 1;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *tx)
            .await?;

        for line in &entry.items {
            let result = sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, item_id, quantity, price_cents)
                SELECT ?1, ?2, ?3, ?4, ?5
                WHERE EXISTS (SELECT 1 FROM items WHERE id = ?3)
                ON CONFLICT(id) DO UPDATE SET
                    order_id = excluded.order_id,
                    item_id = excluded.item_id,
                    quantity = excluded.quantity,
                    price_cents = excluded.price_cents
                "#,
            )
            .bind(&line.id)
            .bind(&order.id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.price_cents)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                report.skipped_lines += 1;
            } else {
                report.order_lines += 1;
            }
        }
    }

    tx.commit().await?;

    info!(
        items = report.items,
        orders = report.orders,
        lines = report.order_lines,
        skipped = report.skipped_lines,
        "Backup restored"
    );

    let feed = db.feed();
    if report.items > 0 {
        feed.publish(Table::Items, ChangeKind::Update, None);
    }
    if report.orders > 0 {
        feed.publish(Table::Orders, ChangeKind::Update, None);
    }

    Ok(report)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::ChangeFilter;
    use crate::repository::test_support::{database, item_input, warehouse_input};
    use stockroom_core::{OrderInput, OrderLineInput, OrderStatus};

    async fn populated() -> Database {
        let db = database().await;
        let warehouse = db.warehouses().create(&warehouse_input("Main")).await.unwrap();
        let mut input = item_input("BK-1");
        input.warehouse_id = Some(warehouse.id);
        let item = db.items().create(&input).await.unwrap();
        let gone = db.items().create(&item_input("BK-2")).await.unwrap();
        db.items().trash(&gone.id).await.unwrap();

        db.orders()
            .create(&OrderInput {
                currency: "MAD".to_string(),
                items: vec![OrderLineInput {
                    item_id: item.id,
                    quantity: 4,
                    price_cents: 990,
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_export_includes_trash_and_lines() {
        let db = populated().await;
        let doc = export(&db, None).await.unwrap();

        assert_eq!(doc.items.len(), 2);
        assert!(doc.items.iter().any(|i| i.deleted_at.is_some()));
        assert_eq!(doc.orders.len(), 1);
        assert_eq!(doc.orders[0].items.len(), 1);
        assert!(doc.settings.is_none());
    }

    #[tokio::test]
    async fn test_restore_into_empty_database() {
        let source = populated().await;
        let json = export(&source, None).await.unwrap().to_json_pretty().unwrap();

        let target = database().await;
        let mut sub = target.subscribe(ChangeFilter::table(Table::Items));
        let doc = BackupDocument::parse(&json).unwrap();
        let report = restore(&target, &doc).await.unwrap();

        assert_eq!(report.items, 2);
        assert_eq!(report.orders, 1);
        assert_eq!(report.order_lines, 1);
        assert_eq!(report.skipped_lines, 0);

        // The warehouse was not part of the backup.
        let restored = target.items().get(&doc.items[0].id).await.unwrap();
        assert_eq!(restored.warehouse_id, None);
        assert_eq!(restored.sku, "BK-1");

        let event = sub.try_recv().unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
    }

    #[tokio::test]
    async fn test_restore_overwrites_and_skips_orphan_lines() {
        let db = populated().await;
        let mut doc = export(&db, None).await.unwrap();
        doc.items.retain(|i| i.sku == "BK-1");
        doc.items[0].quantity = 99;
        doc.orders[0].order.status = OrderStatus::Delivered;
        doc.orders[0].items[0].item_id = "gone".to_string();

        let report = restore(&db, &doc).await.unwrap();
        assert_eq!(report.skipped_lines, 1);
        assert_eq!(db.items().get(&doc.items[0].id).await.unwrap().quantity, 99);

        let order = db.orders().get(&doc.orders[0].order.id).await.unwrap();
        assert_eq!(order.order.status, OrderStatus::Delivered);
        assert!(order.items.is_empty());
    }
}
