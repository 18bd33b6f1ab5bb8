use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueueStatus {
    pub queue_length: usize,
    pub is_draining: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub admitted_count: u32,
    pub limit: u32,
    pub window_reset_at: DateTime<Utc>,
}
