pub mod activity_log;
pub mod backend;
pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod event_bus;
pub mod ledger;
pub mod rate_limiter;
