use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::domain::{
    models::{Attempt, AttemptId, AttemptStatus, Message},
    repositories::AttemptRepository,
};

#[derive(Default)]
struct Ledger {
    attempts: HashMap<AttemptId, Attempt>,
    // insertion order
    order: Vec<AttemptId>,
}

#[derive(Default)]
pub struct InMemoryAttemptRepository {
    ledger: Arc<RwLock<Ledger>>,
}

impl InMemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptRepository for InMemoryAttemptRepository {
    async fn insert(&self, attempt: Attempt) -> anyhow::Result<Attempt> {
        let mut ledger = self.ledger.write().await;
        if ledger.attempts.contains_key(&attempt.id) {
            anyhow::bail!("attempt {} already exists", attempt.id);
        }
        ledger.order.push(attempt.id);
        ledger.attempts.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn update(&self, attempt: &Attempt) -> anyhow::Result<()> {
        let mut ledger = self.ledger.write().await;
        let stored = ledger
            .attempts
            .get_mut(&attempt.id)
            .ok_or_else(|| anyhow::anyhow!("attempt {} not found", attempt.id))?;

        if stored.status.is_terminal() {
            anyhow::bail!("attempt {} is already {}", attempt.id, stored.status);
        }
        *stored = attempt.clone();
        Ok(())
    }

    async fn get(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>> {
        let ledger = self.ledger.read().await;
        Ok(ledger.attempts.get(&id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Attempt>> {
        let ledger = self.ledger.read().await;
        let mut attempts: Vec<Attempt> = ledger
            .order
            .iter()
            .rev()
            .filter_map(|id| ledger.attempts.get(id).cloned())
            .collect();
        // stable: equal timestamps keep newest-inserted first
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(attempts)
    }

    async fn find_duplicate(
        &self,
        message: &Message,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<Attempt>> {
        let ledger = self.ledger.read().await;
        Ok(ledger
            .order
            .iter()
            .filter_map(|id| ledger.attempts.get(id))
            .find(|a| {
                !matches!(a.status, AttemptStatus::Failed | AttemptStatus::RateLimited)
                    && a.created_at >= since
                    && a.message.is_duplicate_of(message)
            })
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn message(body: &str) -> Message {
        Message::new("ops@example.com", "deploy", body)
    }

    #[tokio::test]
    async fn lists_most_recent_first() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();
        let older = repo
            .insert(Attempt::new(message("one"), 3, now - TimeDelta::seconds(10)))
            .await
            .unwrap();
        let newer = repo.insert(Attempt::new(message("two"), 3, now)).await.unwrap();

        let ids: Vec<_> = repo.list().await.unwrap().iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn duplicates_ignore_failed_and_stale_attempts() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();
        let since = now - TimeDelta::minutes(5);

        let mut failed = Attempt::new(message("same"), 3, now);
        failed.status = AttemptStatus::Failed;
        repo.insert(failed).await.unwrap();
        repo.insert(Attempt::new(message("same"), 3, now - TimeDelta::minutes(6)))
            .await
            .unwrap();
        assert!(repo.find_duplicate(&message("same"), since).await.unwrap().is_none());

        let live = repo.insert(Attempt::new(message("same"), 3, now)).await.unwrap();
        let found = repo.find_duplicate(&message("same"), since).await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(live.id));
        assert!(repo.find_duplicate(&message("other"), since).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rate_limited_attempts_do_not_block_resubmission() {
        let repo = InMemoryAttemptRepository::new();
        let now = Utc::now();

        let mut rejected = Attempt::new(message("same"), 3, now);
        rejected.status = AttemptStatus::RateLimited;
        repo.insert(rejected).await.unwrap();

        let since = now - TimeDelta::minutes(5);
        assert!(repo.find_duplicate(&message("same"), since).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refuses_to_mutate_terminal_attempts() {
        let repo = InMemoryAttemptRepository::new();
        let mut attempt = repo
            .insert(Attempt::new(message("x"), 3, Utc::now()))
            .await
            .unwrap();

        attempt.status = AttemptStatus::Sent;
        repo.update(&attempt).await.unwrap();

        attempt.status = AttemptStatus::Failed;
        assert!(repo.update(&attempt).await.is_err());
        let stored = repo.get(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AttemptStatus::Sent);
    }
}
