use std::any::Any;
use std::collections::VecDeque;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{Mutex, Notify};

use crate::{
    application::services::{
        activity_log::ActivityLog,
        backend::BackendGateway,
        backoff::RetryPolicy,
        circuit_breaker::CircuitBreakerRegistry,
        ledger::AttemptLedger,
    },
    domain::models::{
        Attempt, AttemptId, AttemptStatus, DeliveryOutcome, DeliveryRecord, QueueStatus,
    },
};

#[derive(Default)]
struct DispatchQueue {
    pending: VecDeque<AttemptId>,
    draining: bool,
}

/// FIFO queue plus a single on-demand drain task that runs each attempt
/// through retry rounds, trying every backend in priority order per round.
pub struct MessageDispatcher {
    ledger: AttemptLedger,
    gateway: BackendGateway,
    breakers: Arc<CircuitBreakerRegistry>,
    activity: Arc<ActivityLog>,
    retry: RetryPolicy,
    queue: Mutex<DispatchQueue>,
    idle: Notify,
}

impl MessageDispatcher {
    pub fn new(
        ledger: AttemptLedger,
        gateway: BackendGateway,
        breakers: Arc<CircuitBreakerRegistry>,
        activity: Arc<ActivityLog>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            gateway,
            breakers,
            activity,
            retry,
            queue: Mutex::new(DispatchQueue::default()),
            idle: Notify::new(),
        }
    }

    /// Appends to the queue and starts a drain task unless one is running.
    pub async fn enqueue(self: &Arc<Self>, id: AttemptId) {
        let start_drain = {
            let mut queue = self.queue.lock().await;
            queue.pending.push_back(id);
            !std::mem::replace(&mut queue.draining, true)
        };

        if start_drain {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move { dispatcher.drain().await });
        }
    }

    pub async fn status(&self) -> QueueStatus {
        let queue = self.queue.lock().await;
        QueueStatus {
            queue_length: queue.pending.len(),
            is_draining: queue.draining,
        }
    }

    /// Resolves once the queue is empty and no drain task is running.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            {
                let queue = self.queue.lock().await;
                if !queue.draining && queue.pending.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut queue = self.queue.lock().await;
                match queue.pending.pop_front() {
                    Some(id) => id,
                    None => {
                        queue.draining = false;
                        self.idle.notify_waiters();
                        return;
                    }
                }
            };

            // Each attempt runs in its own task so a panicking backend only
            // takes that attempt down, not the drain loop.
            let dispatcher = Arc::clone(&self);
            match tokio::spawn(async move { dispatcher.process(next).await }).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    self.activity
                        .error(
                            "dispatch aborted",
                            json!({ "attempt_id": next, "error": err.to_string() }),
                        )
                        .await;
                }
                Err(join_err) => {
                    let reason = if join_err.is_panic() {
                        format!("dispatch panicked: {}", panic_message(join_err.into_panic()))
                    } else {
                        "dispatch task cancelled".to_string()
                    };
                    self.abandon(next, reason).await;
                }
            }
        }
    }

    /// Marks an attempt whose dispatch task died as `Failed`.
    async fn abandon(&self, id: AttemptId, reason: String) {
        let result = async {
            if let Some(mut attempt) = self.ledger.get(id).await? {
                if !attempt.status.is_terminal() {
                    attempt.status = AttemptStatus::Failed;
                    attempt.last_error = Some(reason.clone());
                    self.ledger.save(&mut attempt).await?;
                }
            }
            anyhow::Ok(())
        }
        .await;

        let mut context = json!({ "attempt_id": id, "error": reason });
        if let Err(err) = result {
            context["ledger_error"] = json!(err.to_string());
        }
        self.activity.error("dispatch aborted", context).await;
    }

    async fn process(&self, id: AttemptId) -> anyhow::Result<()> {
        let mut attempt = self
            .ledger
            .get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("attempt {id} not found in ledger"))?;

        if attempt.status.is_terminal() {
            return Ok(());
        }

        attempt.status = AttemptStatus::Sending;
        self.ledger.save(&mut attempt).await?;

        let rounds = attempt.max_attempts;
        for round in 0..rounds {
            attempt.attempt_count += 1;
            self.ledger.save(&mut attempt).await?;

            if self.run_round(&mut attempt).await? {
                return Ok(());
            }

            if round + 1 < rounds {
                let delay = self.retry.delay_for(round);
                tracing::debug!(attempt_id = %id, round, ?delay, "backing off before next round");
                tokio::time::sleep(delay).await;
            }
        }

        attempt.status = AttemptStatus::Failed;
        self.ledger.save(&mut attempt).await?;
        self.activity
            .error(
                "all backends exhausted",
                json!({
                    "attempt_id": id,
                    "attempts": attempt.attempt_count,
                    "last_error": attempt.last_error,
                }),
            )
            .await;
        Ok(())
    }

    /// Tries each backend once. Returns `true` once one delivers.
    async fn run_round(&self, attempt: &mut Attempt) -> anyhow::Result<bool> {
        let round = attempt.attempt_count;
        let mut invoked = false;

        for backend in self.gateway.backends() {
            let name = backend.name();

            if !self.breakers.allow(name).await {
                attempt.history.push(DeliveryRecord {
                    round,
                    backend: name.to_string(),
                    outcome: DeliveryOutcome::Skipped,
                    at: self.ledger.now(),
                });
                self.ledger.save(attempt).await?;
                continue;
            }
            invoked = true;

            match self.gateway.invoke(backend.as_ref(), &attempt.message).await {
                Ok(message_id) => {
                    self.breakers.record_success(name).await;

                    let now = self.ledger.now();
                    attempt.status = AttemptStatus::Sent;
                    attempt.sent_at = Some(now);
                    attempt.backend = Some(name.to_string());
                    attempt.backend_message_id = Some(message_id.clone());
                    attempt.history.push(DeliveryRecord {
                        round,
                        backend: name.to_string(),
                        outcome: DeliveryOutcome::Delivered {
                            message_id: message_id.clone(),
                        },
                        at: now,
                    });
                    self.ledger.save(attempt).await?;

                    self.activity
                        .info(
                            "message sent",
                            json!({
                                "attempt_id": attempt.id,
                                "backend": name,
                                "message_id": message_id,
                                "round": round,
                            }),
                        )
                        .await;
                    return Ok(true);
                }
                Err(err) => {
                    let reason = err.to_string();
                    attempt.last_error = Some(format!("{name}: {reason}"));
                    attempt.history.push(DeliveryRecord {
                        round,
                        backend: name.to_string(),
                        outcome: DeliveryOutcome::Failed {
                            reason: reason.clone(),
                        },
                        at: self.ledger.now(),
                    });

                    let breaker = self.breakers.record_failure(name).await;
                    self.ledger.save(attempt).await?;

                    self.activity
                        .warn(
                            "backend attempt failed",
                            json!({
                                "attempt_id": attempt.id,
                                "backend": name,
                                "error": reason,
                                "round": round,
                                "failure_count": breaker.failure_count,
                            }),
                        )
                        .await;
                    if breaker.is_open {
                        self.activity
                            .warn(
                                "circuit breaker open",
                                json!({
                                    "backend": name,
                                    "failure_count": breaker.failure_count,
                                    "resume_at": breaker.resume_at,
                                }),
                            )
                            .await;
                    }
                }
            }
        }

        if !invoked {
            attempt.last_error = Some("no backend available: all circuit breakers open".to_string());
            self.ledger.save(attempt).await?;
            self.activity
                .warn(
                    "round skipped, every circuit open",
                    json!({ "attempt_id": attempt.id, "round": round }),
                )
                .await;
        }
        Ok(false)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
