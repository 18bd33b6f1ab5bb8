use crate::{
    application::services::ledger::AttemptLedger,
    domain::models::{Attempt, AttemptId},
};

pub struct GetAttemptUseCase {
    ledger: AttemptLedger,
}

impl GetAttemptUseCase {
    pub fn new(ledger: AttemptLedger) -> Self {
        Self { ledger }
    }

    pub async fn execute(&self, id: AttemptId) -> anyhow::Result<Option<Attempt>> {
        self.ledger.get(id).await
    }
}
