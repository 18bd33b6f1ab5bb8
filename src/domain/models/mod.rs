pub mod activity;
pub mod attempt;
pub mod backend;
pub mod message;
pub mod status;

pub use activity::{ActivityEntry, LogLevel};
pub use attempt::{Attempt, AttemptId, AttemptStatus, DeliveryOutcome, DeliveryRecord};
pub use backend::{BackendHealth, BackendStatus, BreakerState};
pub use message::Message;
pub use status::{QueueStatus, RateLimitStatus};
