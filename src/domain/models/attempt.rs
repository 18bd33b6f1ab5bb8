use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::Message;

/// Caller-opaque identity of an [`Attempt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(pub Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Queued,
    Sending,
    Sent,
    Failed,
    RateLimited,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "pending",
            AttemptStatus::Queued => "queued",
            AttemptStatus::Sending => "sending",
            AttemptStatus::Sent => "sent",
            AttemptStatus::Failed => "failed",
            AttemptStatus::RateLimited => "rate_limited",
        }
    }

    /// `Sent`, `Failed` and `RateLimited` accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Sent | AttemptStatus::Failed | AttemptStatus::RateLimited
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered { message_id: String },
    Failed { reason: String },
    /// The backend's circuit breaker was open.
    Skipped,
}

/// One backend invocation (or skip) made on behalf of an attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub round: u32,
    pub backend: String,
    pub outcome: DeliveryOutcome,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub message: Message,
    pub status: AttemptStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub backend: Option<String>,
    pub backend_message_id: Option<String>,
    pub last_error: Option<String>,
    pub history: Vec<DeliveryRecord>,
}

impl Attempt {
    pub fn new(message: Message, max_attempts: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new(),
            message,
            status: AttemptStatus::Pending,
            attempt_count: 0,
            max_attempts,
            created_at: now,
            updated_at: now,
            sent_at: None,
            backend: None,
            backend_message_id: None,
            last_error: None,
            history: Vec::new(),
        }
    }
}
