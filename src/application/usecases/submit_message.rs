use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::Mutex;

use crate::{
    application::{
        handlers::message_dispatcher::MessageDispatcher,
        services::{
            activity_log::ActivityLog, clock::before, ledger::AttemptLedger,
            rate_limiter::RateLimiter,
        },
    },
    domain::{
        errors::DispatchError,
        models::{AttemptId, AttemptStatus, Message},
    },
};

pub struct SubmitMessageConfig {
    pub max_attempts: u32,
    pub dedup_window: Duration,
}

pub struct SubmitMessageUseCase {
    ledger: AttemptLedger,
    limiter: Arc<RateLimiter>,
    dispatcher: Arc<MessageDispatcher>,
    activity: Arc<ActivityLog>,
    config: SubmitMessageConfig,
    // Serializes the duplicate check with the insert that follows it.
    admission: Mutex<()>,
}

impl SubmitMessageUseCase {
    pub fn new(
        ledger: AttemptLedger,
        limiter: Arc<RateLimiter>,
        dispatcher: Arc<MessageDispatcher>,
        activity: Arc<ActivityLog>,
        config: SubmitMessageConfig,
    ) -> Self {
        Self {
            ledger,
            limiter,
            dispatcher,
            activity,
            config,
            admission: Mutex::new(()),
        }
    }

    pub async fn execute(&self, message: Message) -> Result<AttemptId, DispatchError> {
        let mut attempt = {
            let _admission = self.admission.lock().await;

            let since = before(self.ledger.now(), self.config.dedup_window);
            if let Some(existing) = self.ledger.find_duplicate(&message, since).await? {
                self.activity
                    .info(
                        "duplicate submission",
                        json!({
                            "attempt_id": existing.id,
                            "status": existing.status,
                            "recipient": existing.message.recipient,
                        }),
                    )
                    .await;
                return Ok(existing.id);
            }

            self.ledger.create(message, self.config.max_attempts).await?
        };

        if !self.limiter.admit().await {
            attempt.status = AttemptStatus::RateLimited;
            attempt.last_error = Some("rate limit exceeded".to_string());
            self.ledger.save(&mut attempt).await?;
            self.activity
                .warn("rate limit exceeded", json!({ "attempt_id": attempt.id }))
                .await;
            return Err(DispatchError::RateLimitExceeded {
                attempt_id: attempt.id,
            });
        }

        attempt.status = AttemptStatus::Queued;
        self.ledger.save(&mut attempt).await?;
        self.dispatcher.enqueue(attempt.id).await;

        Ok(attempt.id)
    }
}
