use serde::{Deserialize, Serialize};

/// Caller-supplied payload. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sender: Option<String>,
}

impl Message {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            sender: None,
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Two messages are duplicates when recipient, subject and body match.
    /// The sender does not take part in deduplication.
    pub fn is_duplicate_of(&self, other: &Message) -> bool {
        self.recipient == other.recipient && self.subject == other.subject && self.body == other.body
    }
}
