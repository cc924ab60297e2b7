//! # Domain Types
//!
//! Records used throughout Stockroom, plus the input and filter shapes the
//! data-access layer accepts.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Item       │   │    Warehouse    │   │     Order       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │──▶│  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  name           │   │  customer_id ───┼──▶ Customer
//! │  │  *_price_cents  │   │  items_count*   │   │  status         │       │
//! │  │  deleted_at?    │   └─────────────────┘   │  total_cents    │       │
//! │  └─────────────────┘     * computed on read  └────────┬────────┘       │
//! │                                                       │ 1..n            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    Settings     │   │  Notification   │   │   OrderItem     │       │
//! │  │  one per user   │   │  info/success/  │   │  item_id        │       │
//! │  │  theme, locale  │   │  warning/error  │   │  price_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Administration: Organization ◀── UserProfile (admin/manager/staff)     │
//! │  History:        AuditLog, SystemLog                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Item Lifecycle
//! ```text
//!   Active ──trash──▶ Trashed ──purge──▶ (gone)
//!     ▲                  │
//!     └─────restore──────┘
//! ```
//! There is no stored state column: an item is trashed exactly when
//! `deleted_at` is set.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Sorting
// =============================================================================

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::Desc
    }
}

// =============================================================================
// Item
// =============================================================================

/// Whether an item is live or sitting in the trash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Active,
    Trashed,
}

impl Default for ItemState {
    fn default() -> Self {
        ItemState::Active
    }
}

impl ItemState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ItemState::Active => "active",
            ItemState::Trashed => "trashed",
        }
    }
}

/// A stock item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock code - business identifier, unique among all items.
    pub sku: String,

    pub name: String,
    pub description: Option<String>,

    /// Public URL of the uploaded image.
    pub image_url: Option<String>,

    /// Number of boxes received.
    pub boxes: i64,

    /// Units packed in each box.
    pub units_per_box: i64,

    /// Purchase price per unit in cents.
    pub bought_price_cents: i64,

    /// Shipping cost per unit in cents.
    pub shipment_fees_cents: i64,

    /// Selling price per unit in cents.
    pub selling_price_cents: i64,

    /// Units on hand.
    pub quantity: i64,

    pub warehouse_id: Option<String>,

    /// Warehouse name, joined on read.
    #[serde(default)]
    pub warehouse_name: Option<String>,

    /// ISO 4217 currency code the prices are expressed in.
    pub currency: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Set when the item is moved to the trash.
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Lifecycle state derived from `deleted_at`.
    #[inline]
    pub fn state(&self) -> ItemState {
        if self.deleted_at.is_some() {
            ItemState::Trashed
        } else {
            ItemState::Active
        }
    }

    #[inline]
    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Landed cost per unit: bought price plus shipment fees.
    #[inline]
    pub fn initial_price(&self) -> Money {
        Money::from_cents(self.bought_price_cents + self.shipment_fees_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// Value of the stock on hand at selling price.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.selling_price().multiply_quantity(self.quantity)
    }

    /// When a trashed item becomes eligible for purging.
    ///
    /// Returns `None` for active items.
    pub fn purge_due_at(&self, retention_days: i64) -> Option<DateTime<Utc>> {
        self.deleted_at
            .map(|deleted| deleted + Duration::days(retention_days))
    }

    /// Normalizes the record into the shape the item screens display.
    pub fn to_view(&self) -> ItemView {
        ItemView {
            id: self.id.clone(),
            stock_code: self.sku.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            image_url: self.image_url.clone(),
            boxes: self.boxes,
            units_per_box: self.units_per_box,
            bought_price: self.bought_price_cents,
            shipment_fees: self.shipment_fees_cents,
            initial_price: self.initial_price().cents(),
            selling_price: self.selling_price_cents,
            quantity: self.quantity,
            currency: self.currency.clone(),
            warehouse_id: self.warehouse_id.clone(),
            warehouse_name: self.warehouse_name.clone(),
            deleted_at: self.deleted_at,
            state: self.state(),
        }
    }
}

/// Display shape of an item.
///
/// ## Field Mapping
/// ```text
/// Item.sku                                   → stockCode
/// Item.bought_price + Item.shipment_fees     → initialPrice
/// Item.deleted_at.is_some()                  → state
/// ```
/// Amounts stay in cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct ItemView {
    pub id: String,
    pub stock_code: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub boxes: i64,
    pub units_per_box: i64,
    pub bought_price: i64,
    pub shipment_fees: i64,
    pub initial_price: i64,
    pub selling_price: i64,
    pub quantity: i64,
    pub currency: String,
    pub warehouse_id: Option<String>,
    pub warehouse_name: Option<String>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub state: ItemState,
}

/// Fields accepted when creating or updating an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemInput {
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub boxes: i64,
    pub units_per_box: i64,
    pub bought_price_cents: i64,
    pub shipment_fees_cents: i64,
    pub selling_price_cents: i64,
    pub quantity: i64,
    pub warehouse_id: Option<String>,
    pub currency: String,
}

/// Column an item list is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemSort {
    CreatedAt,
    Name,
    Sku,
    Quantity,
    SellingPrice,
}

impl Default for ItemSort {
    fn default() -> Self {
        ItemSort::CreatedAt
    }
}

/// Filters for the item list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ItemFilter {
    /// Case-insensitive match against sku or name.
    pub search: Option<String>,
    pub warehouse_id: Option<String>,
    pub currency: Option<String>,
    /// Only items whose quantity is at or below this value.
    pub low_stock: Option<i64>,
    #[serde(default)]
    pub state: ItemState,
    #[serde(default)]
    pub sort: ItemSort,
    #[serde(default)]
    pub direction: SortDirection,
}

impl ItemFilter {
    /// Filter selecting the trash.
    pub fn trashed() -> Self {
        ItemFilter {
            state: ItemState::Trashed,
            ..Default::default()
        }
    }
}

// =============================================================================
// Warehouse
// =============================================================================

/// A storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Warehouse {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    /// Active items stored here, counted at read time.
    #[serde(default)]
    pub items_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WarehouseInput {
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WarehouseFilter {
    /// Case-insensitive match against name or location.
    pub search: Option<String>,
}

// =============================================================================
// Customer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerInput {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerFilter {
    /// Case-insensitive match against name, email or phone.
    pub search: Option<String>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Recorded, not yet worked on.
    Pending,
    Processing,
    Shipped,
    Delivered,
    /// Excluded from revenue.
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the order still counts towards revenue.
    #[inline]
    pub const fn counts_as_revenue(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled)
    }
}

// =============================================================================
// Order
// =============================================================================

/// A customer order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: OrderStatus,
    /// Σ price × quantity over the order lines, in cents.
    pub total_amount_cents: i64,
    pub currency: String,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// Unit price in cents at the time of ordering.
    pub price_cents: i64,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.price_cents).multiply_quantity(self.quantity)
    }
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLineInput {
    pub item_id: String,
    pub quantity: i64,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderInput {
    pub customer_id: Option<String>,
    #[serde(default)]
    pub status: OrderStatus,
    pub currency: String,
    pub notes: Option<String>,
    pub items: Vec<OrderLineInput>,
}

impl OrderInput {
    /// Σ price × quantity over the lines.
    pub fn total(&self) -> Money {
        self.items
            .iter()
            .map(|line| Money::from_cents(line.price_cents).multiply_quantity(line.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub created_from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub created_to: Option<DateTime<Utc>>,
}

// =============================================================================
// Notification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

impl Default for NotificationType {
    fn default() -> Self {
        NotificationType::Info
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Notification {
    pub id: String,
    /// Recipient; `None` means everyone.
    pub user_id: Option<String>,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub is_read: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NotificationInput {
    pub user_id: Option<String>,
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: NotificationType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NotificationFilter {
    pub user_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::System
    }
}

/// How often a backup reminder is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BackupFrequency {
    Never,
    Daily,
    Weekly,
    Monthly,
}

impl Default for BackupFrequency {
    fn default() -> Self {
        BackupFrequency::Weekly
    }
}

/// Per-user preferences. There is at most one row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Settings {
    pub id: String,
    pub user_id: String,
    pub currency: String,
    pub language: String,
    pub theme: Theme,
    pub backup_frequency: BackupFrequency,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Partial update of [`Settings`]; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SettingsUpdate {
    pub currency: Option<String>,
    pub language: Option<String>,
    pub theme: Option<Theme>,
    pub backup_frequency: Option<BackupFrequency>,
}

// =============================================================================
// Audit & System Logs
// =============================================================================

/// A user-attributed record of something that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditLog {
    pub id: String,
    pub user_id: Option<String>,
    /// Verb such as `item.trash` or `backup.restore`.
    pub action: String,
    #[ts(type = "unknown")]
    pub details: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// An operational event not tied to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SystemLog {
    pub id: String,
    pub level: LogLevel,
    pub action: String,
    #[ts(type = "unknown")]
    pub details: serde_json::Value,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AuditFilter {
    pub user_id: Option<String>,
    pub action: Option<String>,
}

// =============================================================================
// Organizations & Users
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Access level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Manager,
    Staff,
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Staff
    }
}

/// A user as seen outside the database layer (no password hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: UserRole,
    pub organization_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Dashboard
// =============================================================================

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DashboardSummary {
    /// Items not in the trash.
    pub total_items: i64,
    /// Σ quantity over active items.
    pub total_quantity: i64,
    /// Σ selling price × quantity over active items, in cents.
    pub stock_value_cents: i64,
    /// Active items at or below the low-stock threshold.
    pub low_stock_count: i64,
    pub trashed_count: i64,
    pub total_customers: i64,
    pub total_warehouses: i64,
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Σ order totals excluding cancelled orders, in cents.
    pub revenue_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_item() -> Item {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        Item {
            id: "item-1".to_string(),
            sku: "SKU-001".to_string(),
            name: "Olive oil 1L".to_string(),
            description: None,
            image_url: None,
            boxes: 4,
            units_per_box: 12,
            bought_price_cents: 4500,
            shipment_fees_cents: 300,
            selling_price_cents: 6000,
            quantity: 48,
            warehouse_id: Some("wh-1".to_string()),
            warehouse_name: Some("Casablanca".to_string()),
            currency: "MAD".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_item_state_follows_deleted_at() {
        let mut item = sample_item();
        assert_eq!(item.state(), ItemState::Active);
        assert_eq!(item.purge_due_at(30), None);

        let deleted = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        item.deleted_at = Some(deleted);
        assert_eq!(item.state(), ItemState::Trashed);
        assert_eq!(
            item.purge_due_at(30),
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_item_view_mapping() {
        let view = sample_item().to_view();
        assert_eq!(view.stock_code, "SKU-001");
        assert_eq!(view.initial_price, 4800);
        assert_eq!(view.warehouse_name.as_deref(), Some("Casablanca"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["stockCode"], "SKU-001");
        assert_eq!(json["initialPrice"], 4800);
        assert_eq!(json["state"], "active");
    }

    #[test]
    fn test_stock_value() {
        assert_eq!(sample_item().stock_value().cents(), 6000 * 48);
    }

    #[test]
    fn test_order_input_total() {
        let input = OrderInput {
            currency: "USD".to_string(),
            items: vec![
                OrderLineInput {
                    item_id: "a".to_string(),
                    quantity: 2,
                    price_cents: 1250,
                },
                OrderLineInput {
                    item_id: "b".to_string(),
                    quantity: 1,
                    price_cents: 999,
                },
            ],
            ..Default::default()
        };
        assert_eq!(input.total().cents(), 3499);
    }

    #[test]
    fn test_notification_serializes_type_field() {
        let n = Notification {
            id: "n-1".to_string(),
            user_id: None,
            message: "Backup complete".to_string(),
            kind: NotificationType::Success,
            is_read: false,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "success");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(ItemFilter::default().state, ItemState::Active);
        assert_eq!(ItemFilter::trashed().state, ItemState::Trashed);
        assert!(!OrderStatus::Cancelled.counts_as_revenue());
    }
}
