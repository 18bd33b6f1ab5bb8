//! In-process outbound message dispatch.
//!
//! Messages are submitted to a [`DispatchEngine`], deduplicated against the
//! attempt ledger, admitted by a fixed-window rate limiter and queued. A single
//! drain task delivers each attempt through an ordered list of
//! [`DeliveryBackend`]s, skipping backends whose circuit breaker is open and
//! backing off exponentially between retry rounds.
//!
//! State is in memory and scoped to one engine instance. There is no
//! durability across restarts and no coordination between instances.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use application::engine::DispatchEngine;
pub use application::services::{
    backend::DeliveryBackend,
    backoff::RetryPolicy,
    circuit_breaker::BreakerConfig,
    clock::{Clock, ManualClock, SystemClock},
    event_bus::SubscriptionId,
    rate_limiter::RateLimitConfig,
};
pub use config::{Config, EngineConfig};
pub use domain::{
    errors::{BackendError, DispatchError},
    events::AttemptEventKind,
    models::{
        ActivityEntry, Attempt, AttemptId, AttemptStatus, BackendHealth, BackendStatus,
        BreakerState, DeliveryOutcome, DeliveryRecord, LogLevel, Message, QueueStatus,
        RateLimitStatus,
    },
    repositories::AttemptRepository,
};
pub use infrastructure::{
    messaging::simulated::SimulatedBackend, repositories::in_memory::InMemoryAttemptRepository,
};
