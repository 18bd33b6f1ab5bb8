use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::services::backend::DeliveryBackend,
    domain::{errors::BackendError, models::Message},
};

/// Stand-in provider that fails at a configured rate after a fixed latency.
pub struct SimulatedBackend {
    name: String,
    failure_rate: f64,
    latency: Duration,
}

impl SimulatedBackend {
    pub fn new(
        name: impl Into<String>,
        failure_rate: f64,
        latency: Duration,
    ) -> Arc<dyn DeliveryBackend> {
        Arc::new(Self {
            name: name.into(),
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency,
        }) as Arc<dyn DeliveryBackend>
    }
}

#[async_trait]
impl DeliveryBackend for SimulatedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self, message: &Message) -> Result<String, BackendError> {
        tokio::time::sleep(self.latency).await;

        if fastrand::f64() < self.failure_rate {
            tracing::debug!(backend = %self.name, recipient = %message.recipient, "simulated failure");
            return Err(BackendError::rejected(format!(
                "{} provider temporarily unavailable",
                self.name
            )));
        }

        let message_id = format!("{}-{}", self.name, Uuid::new_v4());
        tracing::debug!(
            backend = %self.name,
            recipient = %message.recipient,
            subject = %message.subject,
            %message_id,
            "simulated delivery"
        );
        Ok(message_id)
    }
}
