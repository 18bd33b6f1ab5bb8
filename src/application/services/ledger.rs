use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::{
    application::services::{activity_log::ActivityLog, clock::Clock, event_bus::EventBus},
    domain::{
        events::AttemptEventKind,
        models::{Attempt, AttemptId, Message},
        repositories::AttemptRepository,
    },
};

/// Write path of the attempt ledger: every insert publishes `Created`, every
/// later write publishes `Updated`. Both also leave an activity entry.
#[derive(Clone)]
pub struct AttemptLedger {
    repo: Arc<dyn AttemptRepository>,
    events: Arc<EventBus>,
    activity: Arc<ActivityLog>,
    clock: Arc<dyn Clock>,
}

impl AttemptLedger {
    pub fn new(
        repo: Arc<dyn AttemptRepository>,
        events: Arc<EventBus>,
        activity: Arc<ActivityLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            events,
            activity,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create(&self, message: Message, max_attempts: u32) -> anyhow::Result<Attempt> {
        let attempt = self
            .repo
            .insert(Attempt::new(message, max_attempts, self.clock.now()))
            .await?;
        self.activity
            .info(
                "attempt created",
                json!({ "attempt_id": attempt.id, "recipient": attempt.message.recipient }),
            )
            .await;
        self.events.publish(AttemptEventKind::Created, &attempt).await;
        Ok(attempt)
    }

    /// Stamps `updated_at`, persists and publishes the new snapshot.
    pub async fn save(&self, attempt: &mut Attempt) -> anyhow::Result<()> {
        attempt.updated_at = self.clock.now();
        self.repo.update(attempt).await?;
        self.activity
            .debug(
                "attempt updated",
                json!({
                    "attempt_id": attempt.id,
                    "status": attempt.status,
                    "attempt_count": attempt.attempt_count,
                }),
            )
            .await;
        self.events.publish(AttemptEventKind::Updated, attempt).await;
        Ok(())
    }

    pub async fn get(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>> {
        self.repo.get(id).await
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Attempt>> {
        self.repo.list().await
    }

    pub async fn find_duplicate(
        &self,
        message: &Message,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<Attempt>> {
        self.repo.find_duplicate(message, since).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        application::services::clock::SystemClock,
        domain::models::{AttemptStatus, LogLevel},
        infrastructure::repositories::in_memory::InMemoryAttemptRepository,
    };

    fn ledger() -> (AttemptLedger, Arc<ActivityLog>) {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let activity = Arc::new(ActivityLog::new(100, clock.clone()));
        let events = Arc::new(EventBus::new(activity.clone()));
        let repo = Arc::new(InMemoryAttemptRepository::new());
        (AttemptLedger::new(repo, events, activity.clone(), clock), activity)
    }

    #[tokio::test]
    async fn every_write_leaves_an_activity_entry() {
        let (ledger, activity) = ledger();

        let mut attempt = ledger
            .create(Message::new("ops@example.com", "deploy", "done"), 3)
            .await
            .unwrap();
        attempt.status = AttemptStatus::Sending;
        ledger.save(&mut attempt).await.unwrap();
        attempt.attempt_count += 1;
        ledger.save(&mut attempt).await.unwrap();

        let entries = activity.entries().await;
        let messages: Vec<_> = entries.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["attempt created", "attempt updated", "attempt updated"]
        );
        assert_eq!(entries[1].level, LogLevel::Debug);
        assert_eq!(entries[1].context["status"], "sending");
        assert_eq!(entries[2].context["attempt_count"], 1);
    }

    #[tokio::test]
    async fn rejected_write_is_not_logged() {
        let (ledger, activity) = ledger();

        let mut attempt = ledger
            .create(Message::new("ops@example.com", "deploy", "done"), 3)
            .await
            .unwrap();
        attempt.status = AttemptStatus::Sent;
        ledger.save(&mut attempt).await.unwrap();
        attempt.status = AttemptStatus::Failed;
        assert!(ledger.save(&mut attempt).await.is_err());

        let updates = activity
            .entries()
            .await
            .into_iter()
            .filter(|e| e.message == "attempt updated")
            .count();
        assert_eq!(updates, 1);
    }
}
