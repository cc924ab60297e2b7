//! # Error Handler
//!
//! Classifies failures, keeps the most recent ones in memory and optionally
//! tells the user.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  handle(error, context, show_notification)                              │
//! │       │                                                                 │
//! │       ├─▶ classify(error text)          rule table in stockroom-core    │
//! │       ├─▶ LogEntry pushed to the front  ring buffer, 50 entries         │
//! │       └─▶ Notifier::notify(entry)       only if show_notification       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use stockroom_core::classify::classify;
use stockroom_core::{ErrorCategory, ERROR_LOG_CAPACITY};
use tracing::{error, warn};

/// One handled error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogEntry {
    /// Text shown to the user.
    pub message: String,
    pub category: ErrorCategory,
    pub timestamp: DateTime<Utc>,
    /// The error's own text, unmodified.
    pub original_error: String,
    /// What was being attempted, e.g. `"items.fetch"`.
    pub context: Option<String>,
}

/// Delivers a transient notification to the user.
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, entry: &LogEntry);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, entry: &LogEntry) {
        warn!(
            category = %entry.category,
            context = entry.context.as_deref().unwrap_or("-"),
            "{}",
            entry.message
        );
    }
}

#[derive(Debug)]
pub struct ErrorHandler {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    notifier: Arc<dyn Notifier>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new(Arc::new(TracingNotifier))
    }
}

impl ErrorHandler {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self::with_capacity(ERROR_LOG_CAPACITY, notifier)
    }

    pub fn with_capacity(capacity: usize, notifier: Arc<dyn Notifier>) -> Self {
        ErrorHandler {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            notifier,
        }
    }

    /// Records `err` and returns the entry.
    ///
    /// The entry's message is the error's text, or the category's
    /// template when the text is blank.
    pub fn handle<E>(&self, err: &E, context: Option<&str>, show_notification: bool) -> LogEntry
    where
        E: fmt::Display + ?Sized,
    {
        let original = err.to_string();
        let category = classify(&original);
        let message = if original.trim().is_empty() {
            category.default_message().to_string()
        } else {
            original.clone()
        };

        let entry = LogEntry {
            message,
            category,
            timestamp: Utc::now(),
            original_error: original,
            context: context.map(str::to_string),
        };

        error!(
            category = %entry.category,
            context = entry.context.as_deref().unwrap_or("-"),
            error = %entry.original_error,
            "Operation failed"
        );

        {
            let mut entries = self.entries.lock().expect("error log mutex poisoned");
            entries.push_front(entry.clone());
            entries.truncate(self.capacity);
        }

        if show_notification {
            self.notifier.notify(&entry);
        }

        entry
    }

    /// Up to `limit` entries, newest first.
    pub fn get_recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries
            .lock()
            .expect("error log mutex poisoned")
            .iter()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().expect("error log mutex poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("error log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Remembers what it was asked to show.
    #[derive(Debug, Default)]
    struct RecordingNotifier {
        shown: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, entry: &LogEntry) {
            self.shown.lock().unwrap().push(entry.message.clone());
        }
    }

    #[test]
    fn test_classifies_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = ErrorHandler::new(notifier.clone());

        let entry = handler.handle("Invalid login credentials", Some("auth.sign_in"), true);
        assert_eq!(entry.category, ErrorCategory::Authentication);
        assert_eq!(entry.message, "Invalid login credentials");
        assert_eq!(entry.context.as_deref(), Some("auth.sign_in"));

        let entry = handler.handle("network unreachable", None, false);
        assert_eq!(entry.category, ErrorCategory::Network);

        let entry = handler.handle("something odd", None, false);
        assert_eq!(entry.category, ErrorCategory::Unknown);

        assert_eq!(*notifier.shown.lock().unwrap(), vec!["Invalid login credentials"]);
    }

    #[test]
    fn test_blank_error_uses_template() {
        let handler = ErrorHandler::default();
        let entry = handler.handle("", None, false);
        assert_eq!(entry.category, ErrorCategory::Unknown);
        assert_eq!(entry.message, ErrorCategory::Unknown.default_message());
        assert_eq!(entry.original_error, "");
    }

    #[test]
    fn test_ring_buffer_keeps_newest_fifty() {
        let handler = ErrorHandler::default();
        for i in 0..51 {
            handler.handle(&format!("error {i}"), None, false);
        }

        assert_eq!(handler.len(), 50);
        let recent = handler.get_recent(100);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0].message, "error 50");
        assert_eq!(recent[49].message, "error 1");

        assert_eq!(handler.get_recent(3).len(), 3);
        handler.clear();
        assert!(handler.is_empty());
    }
}
