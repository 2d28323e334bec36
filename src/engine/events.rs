use serde::{Deserialize, Serialize};

use crate::probe::TestOutcome;

/// Progress events written by a streaming scan, in emission order:
/// one `Total`, any number of `Result`, then `Complete` (or a single `Error`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScanEvent {
    Total { total: usize },
    Result { outcome: TestOutcome, completed: usize },
    Complete { total: usize },
    Error { message: String },
}

impl ScanEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanEvent::Complete { .. } | ScanEvent::Error { .. })
    }
}
