use std::sync::Arc;

use crate::{
    application::{
        handlers::message_dispatcher::MessageDispatcher,
        services::{
            activity_log::ActivityLog,
            backend::{BackendGateway, DeliveryBackend},
            circuit_breaker::CircuitBreakerRegistry,
            clock::{Clock, SystemClock},
            event_bus::{EventBus, SubscriptionId},
            ledger::AttemptLedger,
            rate_limiter::RateLimiter,
        },
        usecases::{
            get_attempt::GetAttemptUseCase,
            list_attempts::ListAttemptsUseCase,
            submit_message::{SubmitMessageConfig, SubmitMessageUseCase},
        },
    },
    config::EngineConfig,
    domain::{
        errors::DispatchError,
        events::AttemptEventKind,
        models::{
            ActivityEntry, Attempt, AttemptId, BackendStatus, Message, QueueStatus,
            RateLimitStatus,
        },
        repositories::AttemptRepository,
    },
    infrastructure::repositories::in_memory::InMemoryAttemptRepository,
};

/// Owns the ledger, breakers, rate limiter, dispatcher and observers of one
/// engine instance. Instances share nothing, so several can coexist.
pub struct DispatchEngine {
    submit: SubmitMessageUseCase,
    get_attempt: GetAttemptUseCase,
    list_attempts: ListAttemptsUseCase,
    dispatcher: Arc<MessageDispatcher>,
    breakers: Arc<CircuitBreakerRegistry>,
    limiter: Arc<RateLimiter>,
    events: Arc<EventBus>,
    activity: Arc<ActivityLog>,
}

impl DispatchEngine {
    /// In-memory ledger and the system clock.
    ///
    /// Fails with [`DispatchError::DuplicateBackend`] if two backends share a
    /// name.
    pub fn new(
        config: EngineConfig,
        backends: Vec<Arc<dyn DeliveryBackend>>,
    ) -> Result<Self, DispatchError> {
        Self::with_parts(
            config,
            backends,
            Arc::new(InMemoryAttemptRepository::new()),
            Arc::new(SystemClock),
        )
    }

    pub fn with_parts(
        config: EngineConfig,
        backends: Vec<Arc<dyn DeliveryBackend>>,
        repository: Arc<dyn AttemptRepository>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DispatchError> {
        let gateway = BackendGateway::new(backends, config.backend_timeout)?;
        let activity = Arc::new(ActivityLog::new(config.activity_log_capacity, clock.clone()));
        let events = Arc::new(EventBus::new(activity.clone()));
        let ledger =
            AttemptLedger::new(repository, events.clone(), activity.clone(), clock.clone());

        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.breaker,
            clock.clone(),
            gateway.names(),
        ));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, clock));

        let dispatcher = Arc::new(MessageDispatcher::new(
            ledger.clone(),
            gateway,
            breakers.clone(),
            activity.clone(),
            config.retry,
        ));

        let submit = SubmitMessageUseCase::new(
            ledger.clone(),
            limiter.clone(),
            dispatcher.clone(),
            activity.clone(),
            SubmitMessageConfig {
                max_attempts: config.max_attempts.max(1),
                dedup_window: config.dedup_window,
            },
        );

        Ok(Self {
            submit,
            get_attempt: GetAttemptUseCase::new(ledger.clone()),
            list_attempts: ListAttemptsUseCase::new(ledger),
            dispatcher,
            breakers,
            limiter,
            events,
            activity,
        })
    }

    /// Returns without waiting for delivery. A duplicate of a live attempt
    /// inside the dedup window returns the existing id.
    pub async fn submit(&self, message: Message) -> Result<AttemptId, DispatchError> {
        self.submit.execute(message).await
    }

    pub async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, DispatchError> {
        Ok(self.get_attempt.execute(id).await?)
    }

    pub async fn list_attempts(&self) -> Result<Vec<Attempt>, DispatchError> {
        Ok(self.list_attempts.execute().await?)
    }

    pub async fn get_backend_status(&self) -> Vec<BackendStatus> {
        self.breakers.statuses().await
    }

    pub async fn get_queue_status(&self) -> QueueStatus {
        self.dispatcher.status().await
    }

    pub async fn get_rate_limit_status(&self) -> RateLimitStatus {
        self.limiter.status().await
    }

    pub async fn subscribe<F>(&self, kind: AttemptEventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Attempt) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.subscribe(kind, handler).await
    }

    pub async fn unsubscribe(&self, kind: AttemptEventKind, id: SubscriptionId) -> bool {
        self.events.unsubscribe(kind, id).await
    }

    /// Oldest first, capped at the configured retention.
    pub async fn get_activity_log(&self) -> Vec<ActivityEntry> {
        self.activity.entries().await
    }

    pub async fn wait_until_idle(&self) {
        self.dispatcher.wait_until_idle().await
    }
}
