// Transition workflow: error taxonomy and the atomic orchestrator.

pub mod orchestrator;

pub use orchestrator::{
    DefaultHooks, SnapshotRules, TransitionHooks, TransitionOrchestrator, TransitionOutcome,
    TransitionRequest,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{QuestionId, UserId};
use crate::status::{PlanError, Role, Stage};
use crate::storage::StoreError;

/// The workflow error taxonomy. Validation-class errors reject before any
/// write; `Conflict` and the lock errors are caller-retriable.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid filing status: {0}")]
    InvalidStatus(String),
    #[error("{role:?} may not {action} at stage {stage:?}")]
    ForbiddenAction {
        role: Role,
        /// The rejected workflow action or field write.
        action: String,
        stage: Stage,
    },
    #[error("filing is final; no further transition exists")]
    NoNext,
    #[error("target status {target} is behind the canonical next step {next}")]
    Backward { target: String, next: String },
    #[error("target status {target} skips ahead of the canonical next step {next}")]
    Skip { target: String, next: String },
    #[error("prerequisite failed for question {question}: {detail}")]
    PrereqFailed { question: QuestionId, detail: String },
    #[error("question is locked by another user until {expires_at}")]
    LockHeld {
        /// Holder identity, where the caller is allowed to see it.
        holder: Option<UserId>,
        expires_at: DateTime<Utc>,
    },
    #[error("no active lock held by the caller")]
    LockNotHeldOrExpired,
    #[error("concurrent update detected; retry the operation")]
    Conflict,
    #[error("{0} not found")]
    NotFound(String),
    #[error("round {round} is outside 1..={max_rounds}")]
    RoundOutOfBounds { round: u32, max_rounds: u32 },
    #[error("round plan exhausted: {0}")]
    MaxRoundsReached(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    /// HTTP status hint for the surrounding request layer.
    pub fn http_status(&self) -> u16 {
        match self {
            WorkflowError::NotFound(_) => 404,
            WorkflowError::Conflict
            | WorkflowError::LockHeld { .. }
            | WorkflowError::LockNotHeldOrExpired => 409,
            WorkflowError::ForbiddenAction { .. } => 403,
            WorkflowError::Store(_) => 500,
            _ => 422,
        }
    }

    /// True for errors where retrying the same call can succeed.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            WorkflowError::Conflict
                | WorkflowError::LockHeld { .. }
                | WorkflowError::LockNotHeldOrExpired
        )
    }
}

impl From<PlanError> for WorkflowError {
    fn from(err: PlanError) -> Self {
        match err {
            PlanError::OutOfPlan { .. } => WorkflowError::InvalidStatus(err.to_string()),
            PlanError::OddRounds(_) | PlanError::TooFewRounds(_) => {
                WorkflowError::MaxRoundsReached(err.to_string())
            }
        }
    }
}
