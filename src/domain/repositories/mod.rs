use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{Attempt, AttemptId, Message};

/// Storage for the attempt ledger.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn insert(&self, attempt: Attempt) -> anyhow::Result<Attempt>;

    /// Replaces the stored attempt. Fails if the attempt is unknown or
    /// already terminal.
    async fn update(&self, attempt: &Attempt) -> anyhow::Result<()>;

    async fn get(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>>;

    /// Most recently created first.
    async fn list(&self) -> anyhow::Result<Vec<Attempt>>;

    /// Earliest attempt created at or after `since` whose message duplicates
    /// `message`. `Failed` and `RateLimited` attempts never match, so either
    /// can be resubmitted.
    async fn find_duplicate(
        &self,
        message: &Message,
        since: DateTime<Utc>,
    ) -> anyhow::Result<Option<Attempt>>;
}
