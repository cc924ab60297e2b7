//! # Demo Data
//!
//! Populates an empty database with warehouses, items, customers and a few
//! orders for development. Values are derived from the row index, so two
//! runs produce the same catalogue (ids aside).
//!
//! ## Generated Items
//! - SKU: `{CATEGORY}-{INDEX:04}`
//! - Bought price 5.00 - 84.90, fees 10% of that, selling price +35%
//! - Quantity 0 - 119, so some items are always low on stock

use serde::Serialize;
use stockroom_core::{
    CustomerInput, ItemInput, ItemState, OrderInput, OrderLineInput, OrderStatus, WarehouseInput,
};
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::Database;

const WAREHOUSES: &[(&str, &str)] = &[
    ("Casablanca Central", "Ain Sebaa, Casablanca"),
    ("Tanger Med", "Port zone, Tanger"),
    ("Marrakech South", "Sidi Ghanem, Marrakech"),
];

const CATEGORIES: &[(&str, &[&str])] = &[
    ("OIL", &["Olive oil 1L", "Argan oil 250ml", "Sunflower oil 5L", "Olive oil 5L"]),
    ("TEA", &["Green tea 500g", "Mint tea 250g", "Gunpowder tea 1kg"]),
    ("SPC", &["Cumin 100g", "Ras el hanout 100g", "Saffron 1g", "Paprika 200g"]),
    ("CAN", &["Sardines 125g", "Tuna 160g", "Tomato paste 400g"]),
    ("DRY", &["Couscous 1kg", "Lentils 1kg", "Chickpeas 1kg", "Dates 500g"]),
];

const CUSTOMERS: &[(&str, &str)] = &[
    ("Atlas Traders", "orders@atlas-traders.ma"),
    ("Rif Foods", "buy@riffoods.ma"),
    ("Souss Market", "contact@souss-market.ma"),
    ("Epicerie Fès", "commandes@epicerie-fes.ma"),
];

/// Rows written by [`seed`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub warehouses: usize,
    pub items: usize,
    pub customers: usize,
    pub orders: usize,
}

/// Generates `item_count` items plus supporting rows.
///
/// Does nothing when the database already holds items.
pub async fn seed(db: &Database, item_count: usize) -> DbResult<SeedReport> {
    let mut report = SeedReport::default();

    let existing = db.items().count(ItemState::Active).await?
        + db.items().count(ItemState::Trashed).await?;
    if existing > 0 {
        warn!(existing, "Database already has items, skipping seed");
        return Ok(report);
    }

    let mut warehouse_ids = Vec::with_capacity(WAREHOUSES.len());
    for (name, location) in WAREHOUSES {
        let warehouse = db
            .warehouses()
            .create(&WarehouseInput {
                name: (*name).to_string(),
                location: Some((*location).to_string()),
            })
            .await?;
        warehouse_ids.push(warehouse.id);
        report.warehouses += 1;
    }

    let mut items = Vec::with_capacity(item_count);
    let catalogue = CATEGORIES
        .iter()
        .flat_map(|(code, names)| names.iter().map(move |name| (*code, *name)))
        .cycle();
    for (index, (code, name)) in catalogue.take(item_count).enumerate() {
        let input = generate_item(code, name, index, &warehouse_ids);
        let item = db.items().create(&input).await?;
        items.push(item);
        report.items += 1;
    }

    let mut customer_ids = Vec::with_capacity(CUSTOMERS.len());
    for (index, (name, email)) in CUSTOMERS.iter().enumerate() {
        let customer = db
            .customers()
            .create(&CustomerInput {
                name: (*name).to_string(),
                email: Some((*email).to_string()),
                phone: Some(format!("+212 522-{:06}", 100_000 + index * 4_321)),
                address: None,
            })
            .await?;
        customer_ids.push(customer.id);
        report.customers += 1;
    }

    let statuses = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];
    for (index, chunk) in items.chunks(3).take(statuses.len() * 2).enumerate() {
        let order = OrderInput {
            customer_id: customer_ids.get(index % customer_ids.len().max(1)).cloned(),
            status: statuses[index % statuses.len()],
            currency: "MAD".to_string(),
            notes: None,
            items: chunk
                .iter()
                .enumerate()
                .map(|(offset, item)| OrderLineInput {
                    item_id: item.id.clone(),
                    quantity: (offset as i64) + 1,
                    price_cents: item.selling_price_cents,
                })
                .collect(),
        };
        db.orders().create(&order).await?;
        report.orders += 1;
    }

    info!(?report, "Seed complete");
    Ok(report)
}

fn generate_item(code: &str, name: &str, index: usize, warehouse_ids: &[String]) -> ItemInput {
    let bought = 500 + ((index * 37) % 80) as i64 * 100 + ((index * 13) % 10) as i64 * 10;
    let fees = bought / 10;
    let units_per_box = [6, 12, 24][index % 3];
    let quantity = ((index * 29) % 120) as i64;

    ItemInput {
        sku: format!("{code}-{index:04}"),
        name: name.to_string(),
        description: None,
        image_url: None,
        boxes: quantity / units_per_box,
        units_per_box,
        bought_price_cents: bought,
        shipment_fees_cents: fees,
        selling_price_cents: (bought + fees) * 135 / 100,
        quantity,
        warehouse_id: warehouse_ids.get(index % warehouse_ids.len().max(1)).cloned(),
        currency: "MAD".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::database;

    #[tokio::test]
    async fn test_seed_populates_then_skips() {
        let db = database().await;

        let report = seed(&db, 25).await.unwrap();
        assert_eq!(report.items, 25);
        assert_eq!(report.warehouses, WAREHOUSES.len());
        assert_eq!(report.customers, CUSTOMERS.len());
        assert_eq!(report.orders, 9);
        assert_eq!(db.items().count(ItemState::Active).await.unwrap(), 25);

        let again = seed(&db, 25).await.unwrap();
        assert_eq!(again, SeedReport::default());
    }

    #[test]
    fn test_generated_item_is_consistent() {
        let input = generate_item("OIL", "Olive oil 1L", 7, &[]);
        assert_eq!(input.sku, "OIL-0007");
        assert!(input.selling_price_cents > input.bought_price_cents + input.shipment_fees_cents);
        assert_eq!(input.boxes, input.quantity / input.units_per_box);
        assert!(stockroom_core::validation::validate_item_input(&input).is_ok());
    }
}
