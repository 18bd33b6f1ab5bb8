use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{
    application::services::clock::Clock,
    domain::models::{ActivityEntry, LogLevel},
};

pub const DEFAULT_ACTIVITY_LOG_CAPACITY: usize = 1000;

/// Bounded, append-only diagnostics record of engine actions.
///
/// Every entry is mirrored to `tracing` at the matching level.
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<ActivityEntry>>,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            clock,
        }
    }

    pub async fn record(&self, level: LogLevel, message: impl Into<String>, context: Value) {
        let message = message.into();
        match level {
            LogLevel::Debug => tracing::debug!(%context, "{message}"),
            LogLevel::Info => tracing::info!(%context, "{message}"),
            LogLevel::Warn => tracing::warn!(%context, "{message}"),
            LogLevel::Error => tracing::error!(%context, "{message}"),
        }

        let entry = ActivityEntry {
            timestamp: self.clock.now(),
            level,
            message,
            context,
        };

        let mut entries = self.entries.lock().await;
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub async fn debug(&self, message: impl Into<String>, context: Value) {
        self.record(LogLevel::Debug, message, context).await;
    }

    pub async fn info(&self, message: impl Into<String>, context: Value) {
        self.record(LogLevel::Info, message, context).await;
    }

    pub async fn warn(&self, message: impl Into<String>, context: Value) {
        self.record(LogLevel::Warn, message, context).await;
    }

    pub async fn error(&self, message: impl Into<String>, context: Value) {
        self.record(LogLevel::Error, message, context).await;
    }

    /// Oldest first.
    pub async fn entries(&self) -> Vec<ActivityEntry> {
        self.entries.lock().await.iter().cloned().collect()
    }
}
