//! # Change Feed
//!
//! In-process notifications of row changes, used to invalidate caches.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ItemRepository::trash()  ──publish──▶  ChangeFeed (broadcast)          │
//! │  OrderRepository::create() ─publish──▶        │                         │
//! │                                               │                         │
//! │                     ┌─────────────────────────┼──────────────────┐      │
//! │                     ▼                         ▼                  ▼      │
//! │            Subscription{items}     Subscription{*, delete}   ...        │
//! │            (skips other tables)    (skips inserts/updates)              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are hints to re-fetch; they never carry row data. A subscriber
//! that falls behind loses the oldest events and logs a warning.

use serde::Serialize;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Schema name every event is tagged with.
pub const SCHEMA: &str = "public";

/// Events buffered per subscriber before it starts lagging.
const DEFAULT_CAPACITY: usize = 256;

/// Tables that publish changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Items,
    Warehouses,
    Customers,
    Orders,
    Notifications,
    Settings,
    AuditLogs,
    SystemLogs,
    Organizations,
    Users,
}

impl Table {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Table::Items => "items",
            Table::Warehouses => "warehouses",
            Table::Customers => "customers",
            Table::Orders => "orders",
            Table::Notifications => "notifications",
            Table::Settings => "settings",
            Table::AuditLogs => "audit_logs",
            Table::SystemLogs => "system_logs",
            Table::Organizations => "organizations",
            Table::Users => "users",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub schema: &'static str,
    pub table: Table,
    pub kind: ChangeKind,
    /// `None` for bulk changes such as a restore or a trash purge.
    pub record_id: Option<String>,
}

/// Which events a subscriber wants. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Option<Table>,
    pub kind: Option<ChangeKind>,
}

impl ChangeFilter {
    /// Every event.
    pub fn all() -> Self {
        ChangeFilter::default()
    }

    pub fn table(table: Table) -> Self {
        ChangeFilter {
            table: Some(table),
            kind: None,
        }
    }

    pub fn kind(mut self, kind: ChangeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.table.map_or(true, |t| t == event.table) && self.kind.map_or(true, |k| k == event.kind)
    }
}

/// Broadcast hub owned by [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        ChangeFeed { sender }
    }

    /// Publishes a change. Having no subscribers is not an error.
    pub fn publish(&self, table: Table, kind: ChangeKind, record_id: Option<&str>) {
        let event = ChangeEvent {
            schema: SCHEMA,
            table,
            kind,
            record_id: record_id.map(str::to_string),
        };

        debug!(table = %table, kind = ?kind, record_id = ?event.record_id, "Publishing change");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        ChangeFeed::new()
    }
}

/// A filtered view of the change feed.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl Subscription {
    /// Waits for the next matching event.
    ///
    /// Returns `None` once every [`ChangeFeed`] handle has been dropped.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next matching event already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filter_by_table() {
        let feed = ChangeFeed::new();
        let mut items = feed.subscribe(ChangeFilter::table(Table::Items));

        feed.publish(Table::Orders, ChangeKind::Insert, Some("o-1"));
        feed.publish(Table::Items, ChangeKind::Update, Some("i-1"));

        let event = items.recv().await.unwrap();
        assert_eq!(event.table, Table::Items);
        assert_eq!(event.schema, "public");
        assert_eq!(event.record_id.as_deref(), Some("i-1"));
        assert!(items.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_filter_by_kind() {
        let feed = ChangeFeed::new();
        let mut deletes = feed.subscribe(ChangeFilter::all().kind(ChangeKind::Delete));

        feed.publish(Table::Items, ChangeKind::Insert, Some("i-1"));
        feed.publish(Table::Customers, ChangeKind::Delete, Some("c-1"));

        let event = deletes.try_recv().unwrap();
        assert_eq!(event.table, Table::Customers);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_keeps_newest() {
        let feed = ChangeFeed::with_capacity(2);
        let mut sub = feed.subscribe(ChangeFilter::all());

        for i in 0..5 {
            feed.publish(Table::Items, ChangeKind::Update, Some(&i.to_string()));
        }

        let event = sub.try_recv().unwrap();
        assert_eq!(event.record_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let feed = ChangeFeed::new();
        feed.publish(Table::Items, ChangeKind::Delete, None);
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_closed_feed_ends_subscription() {
        let feed = ChangeFeed::new();
        let mut sub = feed.subscribe(ChangeFilter::all());
        drop(feed);
        assert!(sub.recv().await.is_none());
    }
}
