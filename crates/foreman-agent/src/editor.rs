//! The delegation boundary: what crosses between the manager and the
//! editor's edit-application mechanism.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Edit application failed; reported to the manager as a failed
/// [`EditResult`], never as a crash of the parent loop.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("edit application failed: {0}")]
pub struct EditApplyError(pub String);

/// Applies an editor reply to the working tree. The mechanism (edit-block
/// parsing, git commits) is an external collaborator.
#[async_trait]
pub trait EditApplier: Send + Sync {
    async fn apply(&self, reply: &str) -> Result<EditApplyOutcome, EditApplyError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditApplyOutcome {
    pub commit_hashes: Vec<String>,
}

/// Outcome of one delegated edit: the success flag, the cost the editor
/// session accumulated, and the commits it produced, plus a human-readable
/// message surfaced as the tool result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditResult {
    pub success: bool,
    pub cost_delta: f64,
    pub commit_hashes: Vec<String>,
    pub message: String,
}
