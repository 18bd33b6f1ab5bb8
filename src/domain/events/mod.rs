use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle transitions published for every attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AttemptEventKind {
    /// Fired once, when the attempt is inserted into the ledger.
    Created,
    /// Fired for every later mutation.
    Updated,
}

impl AttemptEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptEventKind::Created => "created",
            AttemptEventKind::Updated => "updated",
        }
    }
}

impl fmt::Display for AttemptEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
