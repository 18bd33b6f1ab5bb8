use crate::{application::services::ledger::AttemptLedger, domain::models::Attempt};

pub struct ListAttemptsUseCase {
    ledger: AttemptLedger,
}

impl ListAttemptsUseCase {
    pub fn new(ledger: AttemptLedger) -> Self {
        Self { ledger }
    }

    /// Most recently created first.
    pub async fn execute(&self) -> anyhow::Result<Vec<Attempt>> {
        self.ledger.list().await
    }
}
