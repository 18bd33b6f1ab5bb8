use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendHealth {
    Healthy,
    Degraded,
    Failed,
}

/// Circuit breaker bookkeeping for a single backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BreakerState {
    pub failure_count: u32,
    pub is_open: bool,
    /// Set while open: the earliest time the breaker may go half-open.
    pub resume_at: Option<DateTime<Utc>>,
}

impl From<&BreakerState> for BackendHealth {
    fn from(state: &BreakerState) -> Self {
        if state.is_open {
            BackendHealth::Failed
        } else if state.failure_count > 0 {
            BackendHealth::Degraded
        } else {
            BackendHealth::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStatus {
    pub name: String,
    pub health: BackendHealth,
    pub breaker: BreakerState,
}

impl BackendStatus {
    pub fn new(name: impl Into<String>, breaker: BreakerState) -> Self {
        Self {
            name: name.into(),
            health: BackendHealth::from(&breaker),
            breaker,
        }
    }
}
