//! # Inventory Service
//!
//! Every operation the back office pages call, composed from the
//! repositories, the query cache and the error handler.
//!
//! ## Read and Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  fetch_*(filter, page)                                                  │
//! │     │                                                                   │
//! │     ├─▶ cache.get_or_fetch("{prefix}:{filter,page}")   items,          │
//! │     │                                                  warehouses,     │
//! │     │                                                  organizations,  │
//! │     │                                                  dashboard       │
//! │     └─▶ error ──▶ ErrorHandler::handle ──▶ empty page (never fails)    │
//! │                                                                         │
//! │  create_* / update_* / delete_*                                         │
//! │     │                                                                   │
//! │     └─▶ mutate(context, prefixes, async {                               │
//! │             validate ──▶ repository write ──▶ audit entry               │
//! │         })                                                              │
//! │            ├─▶ Ok  ──▶ invalidate every declared prefix                 │
//! │            └─▶ Err ──▶ ErrorHandler::handle ──▶ returned to caller      │
//! │                                                                         │
//! │  Change feed ──▶ spawn_invalidation_listener ──▶ invalidate prefixes    │
//! │  (covers writes that bypass this service)                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use stockroom_core::validation::{
    normalize_search, validate_customer_input, validate_item_input, validate_non_negative,
    validate_notification_input, validate_order_input, validate_required,
    validate_settings_update, validate_text, validate_warehouse_input,
};
use stockroom_core::{
    AuditFilter, AuditLog, BackupDocument, Customer, CustomerFilter, CustomerInput,
    DashboardSummary, Item, ItemFilter, ItemInput, ItemView, LogLevel, Notification,
    NotificationFilter, NotificationInput, Order, OrderFilter, OrderInput, OrderStatus,
    OrderWithItems, Organization, Page, PageRequest, Settings, SettingsUpdate, SystemLog,
    UserProfile, UserRole, Warehouse, WarehouseFilter, WarehouseInput,
};
use stockroom_db::{backup, ChangeFilter, Database, RestoreReport, SettingsDefaults, Table};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, QueryCache};
use crate::config::{AppConfig, Preferences};
use crate::error::ServiceResult;
use crate::error_log::ErrorHandler;
use crate::upload::{ImageUploader, LocalObjectStore, RetryPolicy, UploadFile};

// =============================================================================
// Cache Prefixes
// =============================================================================

pub const ITEMS: &str = "items";
pub const WAREHOUSES: &str = "warehouses";
pub const ORGANIZATIONS: &str = "organizations";
pub const DASHBOARD: &str = "dashboard";

/// Cached reads that a change to `table` makes stale.
pub fn invalidated_by(table: Table) -> &'static [&'static str] {
    match table {
        // warehouse item counts and the dashboard both read items
        Table::Items => &[ITEMS, WAREHOUSES, DASHBOARD],
        Table::Warehouses => &[WAREHOUSES, ITEMS, DASHBOARD],
        Table::Customers | Table::Orders => &[DASHBOARD],
        Table::Organizations => &[ORGANIZATIONS],
        Table::Notifications
        | Table::Settings
        | Table::AuditLogs
        | Table::SystemLogs
        | Table::Users => &[],
    }
}

fn invalidate(cache: &QueryCache, prefixes: &[&str]) {
    for prefix in prefixes {
        cache.invalidate_prefix(&format!("{prefix}:"));
    }
}

// =============================================================================
// Inventory
// =============================================================================

#[derive(Debug, Clone)]
pub struct Inventory {
    db: Database,
    cache: Arc<QueryCache>,
    errors: Arc<ErrorHandler>,
    uploader: ImageUploader,
    preferences: Preferences,
}

impl Inventory {
    /// Builds the service graph described by `config` on top of `db`.
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let cache = Arc::new(QueryCache::new(config.cache.capacity, config.cache.ttl()));
        let store = Arc::new(LocalObjectStore::from_settings(&config.storage));
        let uploader = ImageUploader::new(
            store,
            &config.storage.folder,
            RetryPolicy::from_settings(&config.storage),
        );

        Self::with_parts(
            db,
            cache,
            Arc::new(ErrorHandler::default()),
            uploader,
            config.preferences.clone(),
        )
    }

    pub fn with_parts(
        db: Database,
        cache: Arc<QueryCache>,
        errors: Arc<ErrorHandler>,
        uploader: ImageUploader,
        preferences: Preferences,
    ) -> Self {
        Inventory {
            db,
            cache,
            errors,
            uploader,
            preferences,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn errors(&self) -> &Arc<ErrorHandler> {
        &self.errors
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    /// Runs a write. On success every key under `prefixes` is dropped from
    /// the cache; on failure the error goes through the error handler and
    /// is returned.
    pub async fn mutate<T, Fut>(
        &self,
        context: &str,
        prefixes: &[&str],
        write: Fut,
    ) -> ServiceResult<T>
    where
        Fut: Future<Output = ServiceResult<T>>,
    {
        match write.await {
            Ok(value) => {
                invalidate(&self.cache, prefixes);
                Ok(value)
            }
            Err(e) => {
                self.errors.handle(&e, Some(context), true);
                Err(e)
            }
        }
    }

    /// Single-record reads: errors are handled and returned.
    async fn lookup<T, Fut>(&self, context: &str, read: Fut) -> ServiceResult<T>
    where
        Fut: Future<Output = ServiceResult<T>>,
    {
        read.await.map_err(|e| {
            self.errors.handle(&e, Some(context), true);
            e
        })
    }

    fn page_or_empty<T, E>(
        &self,
        context: &str,
        page: PageRequest,
        result: Result<Page<T>, E>,
    ) -> Page<T>
    where
        E: std::fmt::Display,
    {
        result.unwrap_or_else(|e| {
            self.errors.handle(&e, Some(context), true);
            Page::empty(page)
        })
    }

    /// Appends an audit entry. A failed append is logged, never fatal.
    async fn audit(&self, user_id: Option<&str>, action: &str, details: Value) {
        if let Err(e) = self.db.audit_logs().record(user_id, action, details).await {
            warn!(action, error = %e, "Failed to record audit entry");
        }
    }

    /// Drops cached reads whenever the change feed reports a write, so
    /// writes made elsewhere (admin CLI, another service instance) are
    /// seen too.
    ///
    /// The task runs until aborted.
    pub fn spawn_invalidation_listener(&self) -> JoinHandle<()> {
        let mut subscription = self.db.subscribe(ChangeFilter::all());
        let cache = Arc::clone(&self.cache);

        tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                let prefixes = invalidated_by(event.table);
                if !prefixes.is_empty() {
                    debug!(table = %event.table, kind = ?event.kind, "Invalidating cached reads");
                    invalidate(&cache, prefixes);
                }
            }
            debug!("Change feed closed, invalidation listener stopped");
        })
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub async fn fetch_items(&self, filter: &ItemFilter, page: PageRequest) -> Page<Item> {
        let page = page.normalized();
        let key = cache_key(ITEMS, filter, page);
        let items = self.db.items();
        let result = self
            .cache
            .get_or_fetch_keyed(key.as_deref(), None, || items.list(filter, page))
            .await;
        self.page_or_empty("items.fetch", page, result)
    }

    /// Same rows as [`fetch_items`](Self::fetch_items), in the wire shape
    /// the item pages render.
    pub async fn fetch_item_views(&self, filter: &ItemFilter, page: PageRequest) -> Page<ItemView> {
        self.fetch_items(filter, page).await.map(|item| item.to_view())
    }

    pub async fn get_item(&self, id: &str) -> ServiceResult<Item> {
        self.lookup("items.get", async { Ok(self.db.items().get(id).await?) })
            .await
    }

    pub async fn create_item(
        &self,
        input: &ItemInput,
        user_id: Option<&str>,
    ) -> ServiceResult<Item> {
        self.mutate("items.create", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_item_input(input)?;
            let item = self.db.items().create(input).await?;
            self.audit(user_id, "item.create", json!({ "id": item.id, "sku": item.sku }))
                .await;
            Ok(item)
        })
        .await
    }

    pub async fn update_item(
        &self,
        id: &str,
        input: &ItemInput,
        user_id: Option<&str>,
    ) -> ServiceResult<Item> {
        self.mutate("items.update", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_required("id", id)?;
            validate_item_input(input)?;
            let item = self.db.items().update(id, input).await?;
            self.audit(user_id, "item.update", json!({ "id": item.id, "sku": item.sku }))
                .await;
            Ok(item)
        })
        .await
    }

    /// Active → Trashed.
    pub async fn trash_item(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Item> {
        self.mutate("items.trash", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_required("id", id)?;
            let item = self.db.items().trash(id).await?;
            self.audit(user_id, "item.trash", json!({ "id": item.id, "sku": item.sku }))
                .await;
            Ok(item)
        })
        .await
    }

    /// Trashed → Active.
    pub async fn restore_item(&self, id: &str, user_id: Option<&str>) -> ServiceResult<Item> {
        self.mutate("items.restore", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_required("id", id)?;
            let item = self.db.items().restore(id).await?;
            self.audit(user_id, "item.restore", json!({ "id": item.id, "sku": item.sku }))
                .await;
            Ok(item)
        })
        .await
    }

    /// Trashed → gone. Active items are `NotFound`.
    pub async fn purge_item(&self, id: &str, user_id: Option<&str>) -> ServiceResult<()> {
        self.mutate("items.purge", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_required("id", id)?;
            self.db.items().purge(id).await?;
            self.audit(user_id, "item.purge", json!({ "id": id })).await;
            Ok(())
        })
        .await
    }

    /// Purges items trashed more than `retention_days` ago. Returns the
    /// purged ids.
    pub async fn purge_expired_trash(
        &self,
        retention_days: i64,
        user_id: Option<&str>,
    ) -> ServiceResult<Vec<String>> {
        self.mutate("items.purge_expired", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            validate_non_negative("retention_days", retention_days)?;
            let cutoff = Utc::now() - Duration::days(retention_days);
            let purged = self.db.items().purge_trashed_before(cutoff).await?;
            if !purged.is_empty() {
                self.audit(
                    user_id,
                    "item.purge_expired",
                    json!({ "retention_days": retention_days, "ids": purged }),
                )
                .await;
            }
            Ok(purged)
        })
        .await
    }

    /// Uploads `file` and points the item's image at it.
    pub async fn upload_item_image(
        &self,
        id: &str,
        file: &UploadFile,
        user_id: Option<&str>,
    ) -> ServiceResult<Item> {
        self.mutate("items.upload_image", &[ITEMS], async {
            validate_required("id", id)?;
            // fail before uploading when the item is gone
            self.db.items().get(id).await?;
            let url = self.uploader.upload(file).await?;
            let item = self.db.items().set_image_url(id, Some(&url)).await?;
            self.audit(user_id, "item.image", json!({ "id": id, "url": url }))
                .await;
            Ok(item)
        })
        .await
    }

    pub async fn remove_item_image(&self, id: &str) -> ServiceResult<Item> {
        self.mutate("items.remove_image", &[ITEMS], async {
            validate_required("id", id)?;
            Ok(self.db.items().set_image_url(id, None).await?)
        })
        .await
    }

    // =========================================================================
    // Warehouses
    // =========================================================================

    pub async fn fetch_warehouses(
        &self,
        filter: &WarehouseFilter,
        page: PageRequest,
    ) -> Page<Warehouse> {
        let page = page.normalized();
        let key = cache_key(WAREHOUSES, filter, page);
        let warehouses = self.db.warehouses();
        let result = self
            .cache
            .get_or_fetch_keyed(key.as_deref(), None, || warehouses.list(filter, page))
            .await;
        self.page_or_empty("warehouses.fetch", page, result)
    }

    /// Every warehouse, for pickers. Empty on error.
    pub async fn all_warehouses(&self) -> Vec<Warehouse> {
        let key = format!("{WAREHOUSES}:all");
        let warehouses = self.db.warehouses();
        match self
            .cache
            .get_or_fetch(&key, None, || warehouses.list_all())
            .await
        {
            Ok(all) => all,
            Err(e) => {
                self.errors.handle(&e, Some("warehouses.all"), true);
                Vec::new()
            }
        }
    }

    pub async fn create_warehouse(&self, input: &WarehouseInput) -> ServiceResult<Warehouse> {
        self.mutate("warehouses.create", &[WAREHOUSES, DASHBOARD], async {
            validate_warehouse_input(input)?;
            Ok(self.db.warehouses().create(input).await?)
        })
        .await
    }

    pub async fn update_warehouse(
        &self,
        id: &str,
        input: &WarehouseInput,
    ) -> ServiceResult<Warehouse> {
        self.mutate("warehouses.update", &[WAREHOUSES, ITEMS], async {
            validate_required("id", id)?;
            validate_warehouse_input(input)?;
            Ok(self.db.warehouses().update(id, input).await?)
        })
        .await
    }

    /// Deletes the warehouse; its items stay, unassigned.
    pub async fn delete_warehouse(&self, id: &str) -> ServiceResult<()> {
        self.mutate("warehouses.delete", &[WAREHOUSES, ITEMS, DASHBOARD], async {
            validate_required("id", id)?;
            Ok(self.db.warehouses().delete(id).await?)
        })
        .await
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub async fn fetch_customers(
        &self,
        filter: &CustomerFilter,
        page: PageRequest,
    ) -> Page<Customer> {
        let page = page.normalized();
        let result = self.db.customers().list(filter, page).await;
        self.page_or_empty("customers.fetch", page, result)
    }

    pub async fn get_customer(&self, id: &str) -> ServiceResult<Customer> {
        self.lookup("customers.get", async { Ok(self.db.customers().get(id).await?) })
            .await
    }

    pub async fn create_customer(&self, input: &CustomerInput) -> ServiceResult<Customer> {
        self.mutate("customers.create", &[DASHBOARD], async {
            validate_customer_input(input)?;
            Ok(self.db.customers().create(input).await?)
        })
        .await
    }

    pub async fn update_customer(
        &self,
        id: &str,
        input: &CustomerInput,
    ) -> ServiceResult<Customer> {
        self.mutate("customers.update", &[], async {
            validate_required("id", id)?;
            validate_customer_input(input)?;
            Ok(self.db.customers().update(id, input).await?)
        })
        .await
    }

    pub async fn delete_customer(&self, id: &str) -> ServiceResult<()> {
        self.mutate("customers.delete", &[DASHBOARD], async {
            validate_required("id", id)?;
            Ok(self.db.customers().delete(id).await?)
        })
        .await
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub async fn fetch_orders(&self, filter: &OrderFilter, page: PageRequest) -> Page<Order> {
        let page = page.normalized();
        let result = self.db.orders().list(filter, page).await;
        self.page_or_empty("orders.fetch", page, result)
    }

    pub async fn get_order(&self, id: &str) -> ServiceResult<OrderWithItems> {
        self.lookup("orders.get", async { Ok(self.db.orders().get(id).await?) })
            .await
    }

    /// Inserts the order and its lines together. Stock is not touched.
    pub async fn create_order(
        &self,
        input: &OrderInput,
        user_id: Option<&str>,
    ) -> ServiceResult<OrderWithItems> {
        self.mutate("orders.create", &[DASHBOARD], async {
            validate_order_input(input)?;
            let order = self.db.orders().create(input).await?;
            self.audit(
                user_id,
                "order.create",
                json!({ "id": order.order.id, "total_cents": order.order.total_amount_cents }),
            )
            .await;
            Ok(order)
        })
        .await
    }

    pub async fn update_order_status(
        &self,
        id: &str,
        status: OrderStatus,
        user_id: Option<&str>,
    ) -> ServiceResult<OrderWithItems> {
        self.mutate("orders.update_status", &[DASHBOARD], async {
            validate_required("id", id)?;
            let order = self.db.orders().update_status(id, status).await?;
            self.audit(user_id, "order.status", json!({ "id": id, "status": status }))
                .await;
            Ok(order)
        })
        .await
    }

    pub async fn delete_order(&self, id: &str, user_id: Option<&str>) -> ServiceResult<()> {
        self.mutate("orders.delete", &[DASHBOARD], async {
            validate_required("id", id)?;
            self.db.orders().delete(id).await?;
            self.audit(user_id, "order.delete", json!({ "id": id })).await;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    pub async fn fetch_notifications(
        &self,
        filter: &NotificationFilter,
        page: PageRequest,
    ) -> Page<Notification> {
        let page = page.normalized();
        let result = self.db.notifications().list(filter, page).await;
        self.page_or_empty("notifications.fetch", page, result)
    }

    pub async fn create_notification(
        &self,
        input: &NotificationInput,
    ) -> ServiceResult<Notification> {
        self.mutate("notifications.create", &[], async {
            validate_notification_input(input)?;
            Ok(self.db.notifications().create(input).await?)
        })
        .await
    }

    pub async fn mark_notification_read(&self, id: &str) -> ServiceResult<Notification> {
        self.mutate("notifications.mark_read", &[], async {
            validate_required("id", id)?;
            Ok(self.db.notifications().mark_read(id).await?)
        })
        .await
    }

    /// Returns how many notifications changed.
    pub async fn mark_all_notifications_read(&self, user_id: Option<&str>) -> ServiceResult<u64> {
        self.mutate("notifications.mark_all_read", &[], async {
            Ok(self.db.notifications().mark_all_read(user_id).await?)
        })
        .await
    }

    pub async fn unread_notification_count(&self, user_id: Option<&str>) -> ServiceResult<i64> {
        self.lookup("notifications.unread_count", async {
            Ok(self.db.notifications().unread_count(user_id).await?)
        })
        .await
    }

    pub async fn delete_notification(&self, id: &str) -> ServiceResult<()> {
        self.mutate("notifications.delete", &[], async {
            validate_required("id", id)?;
            Ok(self.db.notifications().delete(id).await?)
        })
        .await
    }

    // =========================================================================
    // Settings
    // =========================================================================

    fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            currency: self.preferences.currency.clone(),
            language: self.preferences.locale.clone(),
        }
    }

    /// The user's settings; the first read creates them from the configured
    /// preferences.
    pub async fn get_settings(&self, user_id: &str) -> ServiceResult<Settings> {
        self.lookup("settings.get", async {
            validate_required("user_id", user_id)?;
            let defaults = self.settings_defaults();
            Ok(self.db.settings().get_or_create(user_id, &defaults).await?)
        })
        .await
    }

    pub async fn update_settings(
        &self,
        user_id: &str,
        update: &SettingsUpdate,
    ) -> ServiceResult<Settings> {
        self.mutate("settings.update", &[], async {
            validate_required("user_id", user_id)?;
            validate_settings_update(update)?;
            let defaults = self.settings_defaults();
            Ok(self.db.settings().update(user_id, update, &defaults).await?)
        })
        .await
    }

    // =========================================================================
    // Logs
    // =========================================================================

    pub async fn fetch_audit_logs(
        &self,
        filter: &AuditFilter,
        page: PageRequest,
    ) -> Page<AuditLog> {
        let page = page.normalized();
        let result = self.db.audit_logs().list(filter, page).await;
        self.page_or_empty("audit_logs.fetch", page, result)
    }

    pub async fn fetch_system_logs(
        &self,
        level: Option<LogLevel>,
        page: PageRequest,
    ) -> Page<SystemLog> {
        let page = page.normalized();
        let result = self.db.system_logs().list(level, page).await;
        self.page_or_empty("system_logs.fetch", page, result)
    }

    pub async fn log_system_event(
        &self,
        level: LogLevel,
        action: &str,
        details: Value,
    ) -> ServiceResult<SystemLog> {
        self.mutate("system_logs.record", &[], async {
            validate_required("action", action)?;
            Ok(self.db.system_logs().record(level, action, details).await?)
        })
        .await
    }

    // =========================================================================
    // Organizations & Users
    // =========================================================================

    pub async fn fetch_organizations(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Page<Organization> {
        let page = page.normalized();
        let search = match normalize_search(search) {
            Ok(search) => search,
            Err(e) => {
                self.errors.handle(&e, Some("organizations.fetch"), true);
                return Page::empty(page);
            }
        };

        let key = cache_key(ORGANIZATIONS, &search, page);
        let organizations = self.db.organizations();
        let result = self
            .cache
            .get_or_fetch_keyed(key.as_deref(), None, || {
                organizations.list(search.as_deref(), page)
            })
            .await;
        self.page_or_empty("organizations.fetch", page, result)
    }

    pub async fn create_organization(&self, name: &str) -> ServiceResult<Organization> {
        self.mutate("organizations.create", &[ORGANIZATIONS], async {
            validate_text("name", name, 120)?;
            Ok(self.db.organizations().create(name).await?)
        })
        .await
    }

    pub async fn rename_organization(&self, id: &str, name: &str) -> ServiceResult<Organization> {
        self.mutate("organizations.rename", &[ORGANIZATIONS], async {
            validate_required("id", id)?;
            validate_text("name", name, 120)?;
            Ok(self.db.organizations().rename(id, name).await?)
        })
        .await
    }

    /// Members are kept, without an organization.
    pub async fn delete_organization(&self, id: &str) -> ServiceResult<()> {
        self.mutate("organizations.delete", &[ORGANIZATIONS], async {
            validate_required("id", id)?;
            Ok(self.db.organizations().delete(id).await?)
        })
        .await
    }

    pub async fn fetch_users(
        &self,
        organization_id: Option<&str>,
        page: PageRequest,
    ) -> Page<UserProfile> {
        let page = page.normalized();
        let result = self.db.users().list(organization_id, page).await;
        self.page_or_empty("users.fetch", page, result)
    }

    pub async fn set_user_role(
        &self,
        id: &str,
        role: UserRole,
        by: Option<&str>,
    ) -> ServiceResult<UserProfile> {
        self.mutate("users.set_role", &[], async {
            validate_required("id", id)?;
            let user = self.db.users().set_role(id, role).await?;
            self.audit(by, "user.role", json!({ "id": id, "role": role })).await;
            Ok(user)
        })
        .await
    }

    pub async fn set_user_organization(
        &self,
        id: &str,
        organization_id: Option<&str>,
    ) -> ServiceResult<UserProfile> {
        self.mutate("users.set_organization", &[], async {
            validate_required("id", id)?;
            Ok(self.db.users().set_organization(id, organization_id).await?)
        })
        .await
    }

    pub async fn delete_user(&self, id: &str, by: Option<&str>) -> ServiceResult<()> {
        self.mutate("users.delete", &[], async {
            validate_required("id", id)?;
            self.db.users().delete(id).await?;
            self.audit(by, "user.delete", json!({ "id": id })).await;
            Ok(())
        })
        .await
    }

    // =========================================================================
    // Dashboard
    // =========================================================================

    /// Aggregates for the dashboard. All zeros when the query fails.
    pub async fn dashboard(&self) -> DashboardSummary {
        let threshold = self.preferences.low_stock_threshold;
        let key = format!("{DASHBOARD}:{threshold}");
        let dashboard = self.db.dashboard();
        let result = self
            .cache
            .get_or_fetch(&key, None, || dashboard.summary(threshold))
            .await;

        result.unwrap_or_else(|e| {
            self.errors.handle(&e, Some("dashboard.summary"), true);
            DashboardSummary::default()
        })
    }

    // =========================================================================
    // Backup
    // =========================================================================

    /// Items, orders and `user_id`'s settings.
    pub async fn export_backup(&self, user_id: Option<&str>) -> ServiceResult<BackupDocument> {
        self.lookup("backup.export", async {
            let document = backup::export(&self.db, user_id).await?;
            info!(items = document.items.len(), orders = document.orders.len(), "Backup created");
            Ok(document)
        })
        .await
    }

    pub async fn export_backup_json(&self, user_id: Option<&str>) -> ServiceResult<String> {
        let document = self.export_backup(user_id).await?;
        self.lookup("backup.export", async { Ok(document.to_json_pretty()?) })
            .await
    }

    /// Parses `json` and writes its items and orders back.
    ///
    /// ## Errors
    /// `InvalidBackup` when the document lacks `items`, `orders` or
    /// `settings`; nothing is written in that case.
    pub async fn restore_backup(
        &self,
        json: &str,
        user_id: Option<&str>,
    ) -> ServiceResult<RestoreReport> {
        self.mutate("backup.restore", &[ITEMS, WAREHOUSES, DASHBOARD], async {
            let document = BackupDocument::parse(json)?;
            let report = backup::restore(&self.db, &document).await?;
            self.audit(
                user_id,
                "backup.restore",
                json!({
                    "timestamp": document.timestamp,
                    "items": report.items,
                    "orders": report.orders,
                    "skipped_lines": report.skipped_lines,
                }),
            )
            .await;
            Ok(report)
        })
        .await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use std::time::Duration as StdDuration;
    use stockroom_core::{ErrorCategory, ItemState, OrderLineInput};
    use stockroom_db::DbConfig;

    async fn inventory_in(storage: &std::path::Path) -> Inventory {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut config = AppConfig::default();
        config.storage.root = storage.to_path_buf();
        config.storage.public_base_url = "http://localhost/storage".to_string();
        Inventory::new(db, &config)
    }

    async fn inventory() -> Inventory {
        inventory_in(&std::env::temp_dir()).await
    }

    fn item_input(sku: &str, quantity: i64) -> ItemInput {
        ItemInput {
            sku: sku.to_string(),
            name: format!("Item {sku}"),
            boxes: 1,
            units_per_box: 12,
            bought_price_cents: 800,
            shipment_fees_cents: 200,
            selling_price_cents: 1500,
            quantity,
            currency: "MAD".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_item_reads_are_cached_until_a_write() {
        let inv = inventory().await;
        inv.create_item(&item_input("SKU-1", 5), None).await.unwrap();

        let first = inv.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(first.count, 1);

        // Written behind the service's back, with no listener running.
        inv.db().items().create(&item_input("SKU-2", 5)).await.unwrap();
        let cached = inv.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(cached.count, 1);

        inv.create_item(&item_input("SKU-3", 5), None).await.unwrap();
        let fresh = inv.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(fresh.count, 3);
        assert_eq!(fresh.total_pages, 1);
    }

    #[tokio::test]
    async fn test_listener_invalidates_on_external_writes() {
        let inv = inventory().await;
        let listener = inv.spawn_invalidation_listener();

        inv.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(inv.cache().len(), 1);

        inv.db().items().create(&item_input("SKU-1", 5)).await.unwrap();
        tokio::time::timeout(StdDuration::from_secs(2), async {
            while !inv.cache().is_empty() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("cache invalidated by change feed");

        let page = inv.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(page.count, 1);
        listener.abort();
    }

    #[tokio::test]
    async fn test_validation_runs_before_the_database() {
        let inv = inventory().await;

        let err = inv
            .create_item(&item_input("", 5), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(inv.db().items().count(ItemState::Active).await.unwrap(), 0);

        let recent = inv.errors().get_recent(1);
        assert_eq!(recent[0].category, ErrorCategory::Validation);
        assert_eq!(recent[0].context.as_deref(), Some("items.create"));
    }

    #[tokio::test]
    async fn test_failed_reads_return_empty_pages() {
        let inv = inventory().await;
        inv.db().close().await;

        let page = inv
            .fetch_customers(&CustomerFilter::default(), PageRequest::new(2, 10))
            .await;
        assert!(page.is_empty());
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 0);

        let summary = inv.dashboard().await;
        assert_eq!(summary, DashboardSummary::default());
        assert_eq!(inv.errors().len(), 2);
        assert!(inv.cache().is_empty());
    }

    #[tokio::test]
    async fn test_trash_lifecycle_is_audited() {
        let inv = inventory().await;
        let item = inv.create_item(&item_input("SKU-1", 5), Some("u-1")).await.unwrap();

        let err = inv.purge_item(&item.id, None).await.unwrap_err();
        assert!(err.is_not_found());

        let trashed = inv.trash_item(&item.id, Some("u-1")).await.unwrap();
        assert!(trashed.deleted_at.is_some());
        let trash = inv.fetch_items(&ItemFilter::trashed(), PageRequest::default()).await;
        assert_eq!(trash.count, 1);

        let restored = inv.restore_item(&item.id, Some("u-1")).await.unwrap();
        assert_eq!(restored.deleted_at, None);
        assert_eq!(restored.sku, item.sku);
        assert_eq!(restored.quantity, item.quantity);

        inv.trash_item(&item.id, Some("u-1")).await.unwrap();
        inv.purge_item(&item.id, Some("u-1")).await.unwrap();
        assert!(inv.get_item(&item.id).await.unwrap_err().is_not_found());

        let log = inv
            .fetch_audit_logs(
                &AuditFilter {
                    user_id: Some("u-1".to_string()),
                    action: Some("item.trash".to_string()),
                },
                PageRequest::default(),
            )
            .await;
        assert_eq!(log.count, 2);
    }

    #[tokio::test]
    async fn test_purge_expired_trash() {
        let inv = inventory().await;
        let old = inv.create_item(&item_input("SKU-1", 5), None).await.unwrap();
        inv.create_item(&item_input("SKU-2", 5), None).await.unwrap();
        inv.trash_item(&old.id, None).await.unwrap();

        let kept = inv.purge_expired_trash(30, None).await.unwrap();
        assert!(kept.is_empty());

        let purged = inv.purge_expired_trash(0, None).await.unwrap();
        assert_eq!(purged, vec![old.id]);
        assert_eq!(inv.db().items().count(ItemState::Active).await.unwrap(), 1);

        assert!(matches!(
            inv.purge_expired_trash(-1, None).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_orders_feed_the_dashboard() {
        let inv = inventory().await;
        let item = inv.create_item(&item_input("SKU-1", 3), None).await.unwrap();

        let order = inv
            .create_order(
                &OrderInput {
                    currency: "MAD".to_string(),
                    items: vec![OrderLineInput {
                        item_id: item.id.clone(),
                        quantity: 2,
                        price_cents: 1500,
                    }],
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(order.order.total_amount_cents, 3000);
        assert_eq!(order.items.len(), 1);

        let summary = inv.dashboard().await;
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.pending_orders, 1);
        assert_eq!(summary.revenue_cents, 3000);
        assert_eq!(summary.low_stock_count, 1);
        // order creation leaves stock alone
        assert_eq!(inv.get_item(&item.id).await.unwrap().quantity, 3);

        inv.update_order_status(&order.order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        let summary = inv.dashboard().await;
        assert_eq!(summary.revenue_cents, 0);
        assert_eq!(summary.pending_orders, 0);
    }

    #[tokio::test]
    async fn test_settings_created_from_preferences() {
        let inv = inventory().await;

        let settings = inv.get_settings("u-1").await.unwrap();
        assert_eq!(settings.currency, inv.preferences().currency);
        assert_eq!(settings.language, inv.preferences().locale);

        let updated = inv
            .update_settings(
                "u-1",
                &SettingsUpdate {
                    currency: Some("usd".to_string()),
                    language: Some("fr".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, settings.id);
        assert_eq!(updated.currency, "USD");
        assert_eq!(updated.language, "fr");
    }

    #[tokio::test]
    async fn test_backup_restores_into_empty_database() {
        let source = inventory().await;
        source.create_item(&item_input("SKU-1", 4), None).await.unwrap();
        source.create_item(&item_input("SKU-2", 8), None).await.unwrap();
        let json = source.export_backup_json(None).await.unwrap();

        let target = inventory().await;
        let report = target.restore_backup(&json, Some("admin")).await.unwrap();
        assert_eq!(report.items, 2);

        let page = target.fetch_items(&ItemFilter::default(), PageRequest::default()).await;
        assert_eq!(page.count, 2);

        let err = target
            .restore_backup(r#"{"items": []}"#, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(_)));
    }

    #[tokio::test]
    async fn test_organizations_are_cached_and_invalidated() {
        let inv = inventory().await;
        inv.create_organization("Atlas Trading").await.unwrap();

        let page = inv.fetch_organizations(None, PageRequest::default()).await;
        assert_eq!(page.count, 1);

        let org = inv.create_organization("Bahia Supplies").await.unwrap();
        let page = inv.fetch_organizations(None, PageRequest::default()).await;
        assert_eq!(page.count, 2);

        inv.rename_organization(&org.id, "Bahia Imports").await.unwrap();
        let page = inv.fetch_organizations(Some("imports"), PageRequest::default()).await;
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].name, "Bahia Imports");
    }

    #[tokio::test]
    async fn test_upload_item_image() {
        let dir = tempfile::tempdir().unwrap();
        let inv = inventory_in(dir.path()).await;
        let item = inv.create_item(&item_input("SKU-1", 5), None).await.unwrap();

        let updated = inv
            .upload_item_image(&item.id, &UploadFile::new("front.PNG", vec![137, 80, 78, 71]), None)
            .await
            .unwrap();
        let url = updated.image_url.unwrap();
        assert!(url.starts_with("http://localhost/storage/items/"));
        assert!(url.ends_with(".png"));

        let cleared = inv.remove_item_image(&item.id).await.unwrap();
        assert_eq!(cleared.image_url, None);
    }

    #[test]
    fn test_item_writes_invalidate_dependent_reads() {
        assert!(invalidated_by(Table::Items).contains(&WAREHOUSES));
        assert!(invalidated_by(Table::Orders).contains(&DASHBOARD));
        assert!(invalidated_by(Table::Notifications).is_empty());
    }
}
