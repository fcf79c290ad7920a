// In-memory review store. State lives behind one tokio mutex; transactions
// work on a cloned copy and replay a recorded write-set on commit, so a
// dropped transaction leaves no trace and commits are atomic.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{
    AnswerRevision, CatalogueVersionId, Filing, FilingId, ProjectId, Question, QuestionId,
    QuestionLockRecord, RevisionId, Submission, SubmissionAnswer, SubmissionId, UserId,
};
use crate::storage::{Page, ReviewStore, ReviewTx, StoreError};

#[derive(Debug, Default, Clone)]
struct MemState {
    filings: HashMap<FilingId, Filing>,
    questions: Vec<Question>,
    revisions: HashMap<RevisionId, AnswerRevision>,
    /// Insertion-ordered so draft listings are stable for tests.
    revision_order: Vec<RevisionId>,
    submissions: HashMap<SubmissionId, Submission>,
    submission_answers: Vec<SubmissionAnswer>,
    locks: HashMap<(FilingId, QuestionId), QuestionLockRecord>,
}

impl MemState {
    fn questions_for(&self, catalogue: CatalogueVersionId) -> Vec<Question> {
        let mut questions: Vec<Question> = self
            .questions
            .iter()
            .filter(|q| q.catalogue_version == catalogue)
            .cloned()
            .collect();
        questions.sort_by_key(|q| q.order);
        questions
    }

    fn draft_for(&self, filing: FilingId, question: QuestionId) -> Option<AnswerRevision> {
        self.revision_order
            .iter()
            .filter_map(|id| self.revisions.get(id))
            .find(|r| r.filing_id == filing && r.question_id == question && r.is_draft)
            .cloned()
    }

    fn drafts_for(&self, filing: FilingId) -> Vec<AnswerRevision> {
        self.revision_order
            .iter()
            .filter_map(|id| self.revisions.get(id))
            .filter(|r| r.filing_id == filing && r.is_draft)
            .cloned()
            .collect()
    }

    fn max_revision_index(&self, filing: FilingId, question: QuestionId) -> Option<u32> {
        self.revisions
            .values()
            .filter(|r| r.filing_id == filing && r.question_id == question)
            .map(|r| r.revision_index)
            .max()
    }

    fn submission_for(&self, filing: FilingId, round: u32) -> Option<Submission> {
        self.submissions
            .values()
            .find(|s| s.filing_id == filing && s.round == round)
            .cloned()
    }

    fn latest_submission(&self, filing: FilingId) -> Option<Submission> {
        self.submissions
            .values()
            .filter(|s| s.filing_id == filing)
            .max_by_key(|s| s.round)
            .cloned()
    }

    fn answers_for(&self, submission: SubmissionId) -> Vec<SubmissionAnswer> {
        self.submission_answers
            .iter()
            .filter(|a| a.submission_id == submission)
            .cloned()
            .collect()
    }

    fn has_link(&self, submission: SubmissionId, question: QuestionId) -> bool {
        self.submission_answers
            .iter()
            .any(|a| a.submission_id == submission && a.question_id == question)
    }

    fn upsert_revision(&mut self, revision: AnswerRevision) {
        if !self.revisions.contains_key(&revision.id) {
            self.revision_order.push(revision.id);
        }
        self.revisions.insert(revision.id, revision);
    }

    fn apply(&mut self, op: WriteOp) {
        match op {
            WriteOp::PutFiling(filing) => {
                self.filings.insert(filing.id, filing);
            }
            WriteOp::PutRevision(revision) => self.upsert_revision(revision),
            WriteOp::PutSubmission(submission) => {
                self.submissions.insert(submission.id, submission);
            }
            WriteOp::LinkAnswer(link) => {
                // A concurrent committer may have created the same link; the
                // tuple is immutable either way, so the second write is a no-op.
                if !self.has_link(link.submission_id, link.question_id) {
                    self.submission_answers.push(link);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum WriteOp {
    PutFiling(Filing),
    PutRevision(AnswerRevision),
    PutSubmission(Submission),
    LinkAnswer(SubmissionAnswer),
}

/// The in-process persistence engine used by tests and demos.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn ReviewTx>, StoreError> {
        let snapshot = self.state.lock().await.clone();
        Ok(Box::new(MemTx {
            base: Arc::clone(&self.state),
            working: snapshot,
            ops: Vec::new(),
        }))
    }

    async fn create_filing(&self, filing: Filing) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.filings.contains_key(&filing.id) {
            return Err(StoreError::Duplicate(format!("filing {}", filing.id)));
        }
        state.filings.insert(filing.id, filing);
        Ok(())
    }

    async fn filing(&self, id: FilingId) -> Result<Option<Filing>, StoreError> {
        Ok(self.state.lock().await.filings.get(&id).cloned())
    }

    async fn filings_for_project(
        &self,
        project: ProjectId,
        page: Page,
    ) -> Result<Vec<Filing>, StoreError> {
        let state = self.state.lock().await;
        let mut filings: Vec<Filing> = state
            .filings
            .values()
            .filter(|f| f.project_id == project)
            .cloned()
            .collect();
        filings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(page.clamp(filings))
    }

    async fn create_question(&self, question: Question) -> Result<(), StoreError> {
        self.state.lock().await.questions.push(question);
        Ok(())
    }

    async fn questions(&self, catalogue: CatalogueVersionId) -> Result<Vec<Question>, StoreError> {
        Ok(self.state.lock().await.questions_for(catalogue))
    }

    async fn revision(&self, id: RevisionId) -> Result<Option<AnswerRevision>, StoreError> {
        Ok(self.state.lock().await.revisions.get(&id).cloned())
    }

    async fn submission(
        &self,
        filing: FilingId,
        round: u32,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self.state.lock().await.submission_for(filing, round))
    }

    async fn submission_answers(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<SubmissionAnswer>, StoreError> {
        Ok(self.state.lock().await.answers_for(submission))
    }

    async fn question_lock(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<QuestionLockRecord>, StoreError> {
        Ok(self.state.lock().await.locks.get(&(filing, question)).cloned())
    }

    async fn insert_question_lock(&self, record: QuestionLockRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let key = (record.filing_id, record.question_id);
        if state.locks.contains_key(&key) {
            return Err(StoreError::Duplicate(format!(
                "lock {}/{}",
                key.0, key.1
            )));
        }
        state.locks.insert(key, record);
        Ok(())
    }

    async fn replace_question_lock(
        &self,
        record: QuestionLockRecord,
        expected: &QuestionLockRecord,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let key = (record.filing_id, record.question_id);
        match state.locks.get(&key) {
            Some(current) if current == expected => {
                state.locks.insert(key, record);
                Ok(())
            }
            _ => Err(StoreError::Stale(format!("lock {}/{}", key.0, key.1))),
        }
    }

    async fn delete_question_lock(
        &self,
        filing: FilingId,
        question: QuestionId,
        expected_holder: Option<UserId>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let key = (filing, question);
        let matches = match (state.locks.get(&key), expected_holder) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(holder)) => current.holder == holder,
        };
        if matches {
            state.locks.remove(&key);
        }
        Ok(())
    }
}

struct MemTx {
    base: Arc<Mutex<MemState>>,
    working: MemState,
    ops: Vec<WriteOp>,
}

impl MemTx {
    fn record(&mut self, op: WriteOp) {
        self.working.apply(op.clone());
        self.ops.push(op);
    }
}

#[async_trait]
impl ReviewTx for MemTx {
    async fn filing(&self, id: FilingId) -> Result<Option<Filing>, StoreError> {
        Ok(self.working.filings.get(&id).cloned())
    }

    async fn filing_committed(&self, id: FilingId) -> Result<Option<Filing>, StoreError> {
        Ok(self.base.lock().await.filings.get(&id).cloned())
    }

    async fn update_filing(&mut self, mut filing: Filing) -> Result<(), StoreError> {
        filing.version += 1;
        filing.updated_at = chrono::Utc::now();
        self.record(WriteOp::PutFiling(filing));
        Ok(())
    }

    async fn questions(&self, catalogue: CatalogueVersionId) -> Result<Vec<Question>, StoreError> {
        Ok(self.working.questions_for(catalogue))
    }

    async fn revision(&self, id: RevisionId) -> Result<Option<AnswerRevision>, StoreError> {
        Ok(self.working.revisions.get(&id).cloned())
    }

    async fn draft(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<AnswerRevision>, StoreError> {
        Ok(self.working.draft_for(filing, question))
    }

    async fn drafts(&self, filing: FilingId) -> Result<Vec<AnswerRevision>, StoreError> {
        Ok(self.working.drafts_for(filing))
    }

    async fn insert_revision(&mut self, revision: AnswerRevision) -> Result<(), StoreError> {
        if self.working.revisions.contains_key(&revision.id) {
            return Err(StoreError::Duplicate(format!("revision {}", revision.id)));
        }
        self.record(WriteOp::PutRevision(revision));
        Ok(())
    }

    async fn update_revision(&mut self, revision: AnswerRevision) -> Result<(), StoreError> {
        if !self.working.revisions.contains_key(&revision.id) {
            return Err(StoreError::Missing(format!("revision {}", revision.id)));
        }
        self.record(WriteOp::PutRevision(revision));
        Ok(())
    }

    async fn max_revision_index(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<Option<u32>, StoreError> {
        Ok(self.working.max_revision_index(filing, question))
    }

    async fn submission(
        &self,
        filing: FilingId,
        round: u32,
    ) -> Result<Option<Submission>, StoreError> {
        Ok(self.working.submission_for(filing, round))
    }

    async fn latest_submission(&self, filing: FilingId) -> Result<Option<Submission>, StoreError> {
        Ok(self.working.latest_submission(filing))
    }

    async fn insert_submission(&mut self, submission: Submission) -> Result<(), StoreError> {
        if self
            .working
            .submission_for(submission.filing_id, submission.round)
            .is_some()
        {
            return Err(StoreError::Duplicate(format!(
                "submission {}/round {}",
                submission.filing_id, submission.round
            )));
        }
        self.record(WriteOp::PutSubmission(submission));
        Ok(())
    }

    async fn update_submission(&mut self, submission: Submission) -> Result<(), StoreError> {
        if !self.working.submissions.contains_key(&submission.id) {
            return Err(StoreError::Missing(format!("submission {}", submission.id)));
        }
        self.record(WriteOp::PutSubmission(submission));
        Ok(())
    }

    async fn submission_answers(
        &self,
        submission: SubmissionId,
    ) -> Result<Vec<SubmissionAnswer>, StoreError> {
        Ok(self.working.answers_for(submission))
    }

    async fn insert_submission_answer(
        &mut self,
        link: SubmissionAnswer,
    ) -> Result<(), StoreError> {
        if self.working.has_link(link.submission_id, link.question_id) {
            return Err(StoreError::Duplicate(format!(
                "submission answer {}/{}",
                link.submission_id, link.question_id
            )));
        }
        self.record(WriteOp::LinkAnswer(link));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut base = self.base.lock().await;
        for op in self.ops {
            base.apply(op);
        }
        Ok(())
    }

    async fn commit_guarded(
        self: Box<Self>,
        filing: FilingId,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let mut base = self.base.lock().await;
        // Version check and replay share the one lock acquisition, so a
        // writer that slipped in after the caller's reverify cannot be
        // overwritten here.
        match base.filings.get(&filing) {
            Some(current) if current.version == expected_version => {}
            _ => return Err(StoreError::Stale(format!("filing {filing}"))),
        }
        for op in self.ops {
            base.apply(op);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filing() -> Filing {
        Filing::new(ProjectId::new(), CatalogueVersionId::new())
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_no_trace() {
        let store = InMemoryStore::new();
        let f = filing();
        store.create_filing(f.clone()).await.unwrap();

        {
            let mut tx = store.begin().await.unwrap();
            let mut updated = tx.filing(f.id).await.unwrap().unwrap();
            updated.current_score = 5.0;
            tx.update_filing(updated).await.unwrap();
            // dropped without commit
        }

        let reread = store.filing(f.id).await.unwrap().unwrap();
        assert_eq!(reread.current_score, 0.0);
        assert_eq!(reread.version, 0);
    }

    #[tokio::test]
    async fn transaction_reads_its_own_writes_but_committed_read_does_not() {
        let store = InMemoryStore::new();
        let f = filing();
        store.create_filing(f.clone()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let mut updated = tx.filing(f.id).await.unwrap().unwrap();
        updated.current_score = 3.5;
        tx.update_filing(updated).await.unwrap();

        assert_eq!(tx.filing(f.id).await.unwrap().unwrap().current_score, 3.5);
        assert_eq!(
            tx.filing_committed(f.id).await.unwrap().unwrap().current_score,
            0.0
        );

        tx.commit().await.unwrap();
        assert_eq!(store.filing(f.id).await.unwrap().unwrap().current_score, 3.5);
        assert_eq!(store.filing(f.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn duplicate_submission_answer_is_rejected() {
        let store = InMemoryStore::new();
        let f = filing();
        store.create_filing(f.clone()).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let sub = Submission::new(f.id, 1, 0.0);
        tx.insert_submission(sub.clone()).await.unwrap();
        let q = QuestionId::new();
        let link = SubmissionAnswer {
            submission_id: sub.id,
            question_id: q,
            answer_revision_id: RevisionId::new(),
        };
        tx.insert_submission_answer(link.clone()).await.unwrap();
        assert!(matches!(
            tx.insert_submission_answer(link).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn guarded_commit_rejects_a_late_concurrent_filing_write() {
        let store = InMemoryStore::new();
        let f = filing();
        store.create_filing(f.clone()).await.unwrap();

        let mut tx_a = store.begin().await.unwrap();
        let mut tx_b = store.begin().await.unwrap();

        let read = tx_a.filing(f.id).await.unwrap().unwrap();
        let observed = read.version;
        tx_a.update_filing(read).await.unwrap();

        // tx_b commits a bump after tx_a's read but before its commit.
        let other = tx_b.filing(f.id).await.unwrap().unwrap();
        tx_b.update_filing(other).await.unwrap();
        tx_b.commit().await.unwrap();

        assert!(matches!(
            tx_a.commit_guarded(f.id, observed).await,
            Err(StoreError::Stale(_))
        ));
        // Only tx_b's write landed.
        assert_eq!(store.filing(f.id).await.unwrap().unwrap().version, 1);
    }

    #[tokio::test]
    async fn lock_insert_is_first_writer_wins() {
        let store = InMemoryStore::new();
        let (f, q) = (FilingId::new(), QuestionId::new());
        let rec = QuestionLockRecord {
            filing_id: f,
            question_id: q,
            holder: UserId::new(),
            expires_at: chrono::Utc::now(),
        };
        store.insert_question_lock(rec.clone()).await.unwrap();
        assert!(matches!(
            store.insert_question_lock(rec.clone()).await,
            Err(StoreError::Duplicate(_))
        ));

        // Replacement requires the expected current value.
        let other = QuestionLockRecord {
            holder: UserId::new(),
            ..rec.clone()
        };
        assert!(matches!(
            store.replace_question_lock(other.clone(), &other).await,
            Err(StoreError::Stale(_))
        ));
        store.replace_question_lock(other, &rec).await.unwrap();
    }
}
