// Redline Library - Multi-Round Review Workflow Core
// This exposes the core components for testing and integration

pub mod audit;
pub mod config;
pub mod drafts;
pub mod grader;
pub mod identity;
pub mod locks;
pub mod models;
pub mod notify;
pub mod scoring;
pub mod snapshot;
pub mod status;
pub mod storage;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use audit::{AuditLog, AuditRecord, InMemoryAuditLog, TracingAuditLog};
pub use config::{config, init_config, RedlineConfig};
pub use drafts::{DraftSpawner, DraftWorkspace};
pub use grader::{GradeOutcome, GradeRequest, Grader};
pub use identity::{IdentityResolver, StaticDirectory};
pub use locks::{LockStatus, QuestionLockService};
pub use models::{
    AnswerRevision, CatalogueVersionId, Filing, FilingId, ProjectId, Question, QuestionId,
    QuestionLockRecord, RevisionId, Submission, SubmissionAnswer, SubmissionId, UserId,
};
pub use notify::{ChangeEvent, ChangeNotifier, NullNotifier, TopicRegistry};
pub use snapshot::{AuditorAnnotation, SnapshotService};
pub use status::{FilingStatus, Role, RoundPlan, Stage, WorkflowAction};
pub use storage::{InMemoryStore, Page, ReviewStore, ReviewTx, StoreError};
pub use telemetry::{
    create_workflow_span, generate_correlation_id, init_telemetry, shutdown_telemetry,
};
pub use workflow::{
    TransitionHooks, TransitionOrchestrator, TransitionOutcome, TransitionRequest, WorkflowError,
};
