// Persistence collaborator - the core is storage-engine-agnostic beyond
// these traits. The shipped engine is storage::memory::InMemoryStore.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AnswerRevision, CatalogueVersionId, Filing, FilingId, ProjectId, Question, QuestionId,
    QuestionLockRecord, RevisionId, Submission, SubmissionAnswer, SubmissionId, UserId,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-key violation on create (e.g. a second SubmissionAnswer for
    /// the same (submission, question), or a lock row that already exists).
    #[error("duplicate key: {0}")]
    Duplicate(String),
    /// A compare-and-swap write found the row changed underneath the caller.
    #[error("stale write: {0}")]
    Stale(String),
    #[error("{0} not found")]
    Missing(String),
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Offset/limit pagination for list reads. `limit = None` means all rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub(crate) fn clamp<T>(&self, rows: Vec<T>) -> Vec<T> {
        let it = rows.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => it.take(limit).collect(),
            None => it.collect(),
        }
    }
}

/// Entity CRUD plus the transaction boundary and the lock CAS primitives.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Open a transaction. All writes inside it commit together or not at
    /// all; dropping the transaction without committing rolls it back.
    async fn begin(&self) -> Result<Box<dyn ReviewTx>, StoreError>;

    async fn create_filing(&self, filing: Filing) -> Result<(), StoreError>;
    async fn filing(&self, id: FilingId) -> Result<Option<Filing>, StoreError>;
    /// Filings of one project, newest first.
    async fn filings_for_project(
        &self,
        project: ProjectId,
        page: Page,
    ) -> Result<Vec<Filing>, StoreError>;

    async fn create_question(&self, question: Question) -> Result<(), StoreError>;
    /// Questions of a catalogue version, in catalogue order.
    async fn questions(&self, catalogue: CatalogueVersionId) -> Result<Vec<Question>, StoreError>;

    async fn revision(&self, id: RevisionId) -> Result<Option<AnswerRevision>, StoreError>;
    async fn submission(
        &self,
        filing: FilingId,
        round: u32,
    ) -> Result<Option<Submission>, StoreError>;
    async fn submission_answers(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<SubmissionAnswer>, StoreError>;

    // Question lock primitives. Compare-and-swap semantics so concurrent
    // acquires resolve to exactly one winner without a transaction.
    async fn question_lock(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<QuestionLockRecord>, StoreError>;
    /// Fails `Duplicate` when any record (expired or not) already exists.
    async fn insert_question_lock(&self, record: QuestionLockRecord) -> Result<(), StoreError>;
    /// Replaces an existing record only if it still equals `expected`;
    /// fails `Stale` otherwise.
    async fn replace_question_lock(
        &self,
        record: QuestionLockRecord,
        expected: &QuestionLockRecord,
    ) -> Result<(), StoreError>;
    /// Deletes the record if present and, when `expected_holder` is given,
    /// still held by that user. Missing rows are not an error.
    async fn delete_question_lock(
        &self,
        filing: FilingId,
        question: QuestionId,
        expected_holder: Option<UserId>,
    ) -> Result<(), StoreError>;
}

/// A transaction handle. Reads observe this transaction's own uncommitted
/// writes; `filing_committed` deliberately bypasses them so the orchestrator
/// can reverify against the committed row before writing.
#[async_trait]
pub trait ReviewTx: Send + Sync {
    async fn filing(&self, id: FilingId) -> Result<Option<Filing>, StoreError>;
    async fn filing_committed(&self, id: FilingId) -> Result<Option<Filing>, StoreError>;
    /// Upserts the filing, bumping its optimistic version marker.
    async fn update_filing(&mut self, filing: Filing) -> Result<(), StoreError>;

    async fn questions(&self, catalogue: CatalogueVersionId) -> Result<Vec<Question>, StoreError>;

    async fn revision(&self, id: RevisionId) -> Result<Option<AnswerRevision>, StoreError>;
    /// The single live draft for (filing, question), if it exists.
    async fn draft(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<AnswerRevision>, StoreError>;
    /// All live drafts of a filing, in question order of insertion.
    async fn drafts(&self, filing: FilingId) -> Result<Vec<AnswerRevision>, StoreError>;
    async fn insert_revision(&mut self, revision: AnswerRevision) -> Result<(), StoreError>;
    async fn update_revision(&mut self, revision: AnswerRevision) -> Result<(), StoreError>;
    /// Highest revision_index across all revisions of (filing, question).
    async fn max_revision_index(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<u32>, StoreError>;

    async fn submission(
        &self,
        filing: FilingId,
        round: u32,
    ) -> Result<Option<Submission>, StoreError>;
    /// The submission with the highest round number, if any.
    async fn latest_submission(&self, filing: FilingId) -> Result<Option<Submission>, StoreError>;
    async fn insert_submission(&mut self, submission: Submission) -> Result<(), StoreError>;
    async fn update_submission(&mut self, submission: Submission) -> Result<(), StoreError>;

    async fn submission_answers(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<SubmissionAnswer>, StoreError>;
    /// Fails `Duplicate` when a link already exists for (submission, question).
    async fn insert_submission_answer(
        &mut self,
        link: SubmissionAnswer,
    ) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Commit only while the committed filing's version still equals
    /// `expected_version`. The check and the apply happen under one store
    /// lock; a mismatch fails `Stale` and discards the write-set.
    async fn commit_guarded(
        self: Box<Self>,
        filing: FilingId,
        expected_version: u64,
    ) -> Result<(), StoreError>;
}
