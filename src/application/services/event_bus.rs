use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    application::services::activity_log::ActivityLog,
    domain::{events::AttemptEventKind, models::Attempt},
};

/// Observer callback. Receives a snapshot of the attempt.
pub type AttemptHandler = Arc<dyn Fn(&Attempt) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Synchronous publish/subscribe keyed by [`AttemptEventKind`].
///
/// A failing or panicking handler is logged and skipped; it never stops the
/// remaining handlers or reaches the publisher.
pub struct EventBus {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<AttemptEventKind, Vec<(SubscriptionId, AttemptHandler)>>>,
    activity: Arc<ActivityLog>,
}

impl EventBus {
    pub fn new(activity: Arc<ActivityLog>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: RwLock::new(HashMap::new()),
            activity,
        }
    }

    pub async fn subscribe<F>(&self, kind: AttemptEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Attempt) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: AttemptHandler = Arc::new(handler);
        self.subscribers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Returns `false` if no such subscription was registered for `kind`.
    pub async fn unsubscribe(&self, kind: AttemptEventKind, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write().await;
        let Some(handlers) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    pub async fn publish(&self, kind: AttemptEventKind, attempt: &Attempt) {
        // Snapshot so handlers run without holding the lock.
        let handlers: Vec<(SubscriptionId, AttemptHandler)> = self
            .subscribers
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for (id, handler) in handlers {
            let failure = match catch_unwind(AssertUnwindSafe(|| handler(attempt))) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(_) => Some("handler panicked".to_string()),
            };

            if let Some(reason) = failure {
                self.activity
                    .error(
                        format!("{kind} handler failed"),
                        json!({
                            "attempt_id": attempt.id,
                            "subscription": id.0,
                            "error": reason,
                        }),
                    )
                    .await;
            }
        }
    }
}
