use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{
    errors::{BackendError, DispatchError},
    models::Message,
};

/// A delivery capability: makes one transmission attempt and either returns
/// the backend-assigned message id or a failure reason.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    fn name(&self) -> &str;
    async fn attempt(&self, message: &Message) -> Result<String, BackendError>;
}

/// Backends in priority order. Names are unique: each keys its own breaker.
#[derive(Clone)]
pub struct BackendGateway {
    backends: Vec<Arc<dyn DeliveryBackend>>,
    timeout: Option<Duration>,
}

impl BackendGateway {
    /// `timeout` bounds each invocation when set; otherwise a backend may take
    /// as long as it likes.
    pub fn new(
        backends: Vec<Arc<dyn DeliveryBackend>>,
        timeout: Option<Duration>,
    ) -> Result<Self, DispatchError> {
        let mut seen = HashSet::new();
        for backend in &backends {
            if !seen.insert(backend.name()) {
                return Err(DispatchError::DuplicateBackend(backend.name().to_string()));
            }
        }
        Ok(Self { backends, timeout })
    }

    pub fn backends(&self) -> &[Arc<dyn DeliveryBackend>] {
        &self.backends
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    pub async fn invoke(
        &self,
        backend: &dyn DeliveryBackend,
        message: &Message,
    ) -> Result<String, BackendError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, backend.attempt(message))
                .await
                .map_err(|_| BackendError::Timeout(limit))?,
            None => backend.attempt(message).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl DeliveryBackend for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn attempt(&self, _message: &Message) -> Result<String, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_turns_slow_call_into_failure() {
        let gateway =
            BackendGateway::new(vec![Arc::new(Slow)], Some(Duration::from_millis(50))).unwrap();
        let message = Message::new("a@example.com", "s", "b");

        let result = gateway.invoke(gateway.backends()[0].as_ref(), &message).await;

        assert_eq!(result, Err(BackendError::Timeout(Duration::from_millis(50))));
    }

    #[tokio::test(start_paused = true)]
    async fn without_timeout_waits_for_backend() {
        let gateway = BackendGateway::new(vec![Arc::new(Slow)], None).unwrap();
        let message = Message::new("a@example.com", "s", "b");

        let result = gateway.invoke(gateway.backends()[0].as_ref(), &message).await;

        assert_eq!(result, Ok("late".to_string()));
        assert_eq!(gateway.names(), vec!["slow".to_string()]);
    }

    #[test]
    fn rejects_backends_sharing_a_name() {
        let result = BackendGateway::new(vec![Arc::new(Slow), Arc::new(Slow)], None);

        assert!(matches!(
            result,
            Err(DispatchError::DuplicateBackend(name)) if name == "slow"
        ));
    }
}
