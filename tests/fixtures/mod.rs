// Shared test harness: an in-memory store seeded with a two-question
// catalogue, one filing, and the full service stack wired together.
#![allow(dead_code)]

use std::sync::Arc;

use redline::{
    CatalogueVersionId, DraftWorkspace, Filing, InMemoryAuditLog, InMemoryStore, ProjectId,
    Question, QuestionLockService, ReviewStore, Role, RoundPlan, TopicRegistry,
    TransitionOrchestrator, TransitionOutcome, TransitionRequest, UserId, WorkflowAction,
    WorkflowError,
};

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub plan: RoundPlan,
    pub orchestrator: TransitionOrchestrator,
    pub locks: Arc<QuestionLockService>,
    pub workspace: DraftWorkspace,
    pub audit: Arc<InMemoryAuditLog>,
    pub registry: Arc<TopicRegistry>,
    pub filing: Filing,
    pub questions: Vec<Question>,
    pub client: UserId,
    pub auditor: UserId,
}

pub async fn harness(max_rounds: u32) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let plan = RoundPlan::new(max_rounds).unwrap();
    let catalogue = CatalogueVersionId::new();
    let project = ProjectId::new();

    let questions = vec![
        Question::new(catalogue, 1, 5.0, "Scope of processing", "Award up to 5 points"),
        Question::new(catalogue, 2, 5.0, "Retention policy", "Award up to 5 points"),
    ];
    for question in &questions {
        store.create_question(question.clone()).await.unwrap();
    }

    let filing = Filing::new(project, catalogue);
    store.create_filing(filing.clone()).await.unwrap();

    let audit = Arc::new(InMemoryAuditLog::new());
    let registry = Arc::new(TopicRegistry::new(16));
    let orchestrator = TransitionOrchestrator::new(
        store.clone(),
        plan,
        audit.clone(),
        registry.clone(),
    );
    let locks = Arc::new(QuestionLockService::new(
        store.clone(),
        std::time::Duration::from_secs(60),
    ));
    let workspace = DraftWorkspace::new(store.clone(), locks.clone(), plan);

    Harness {
        store,
        plan,
        orchestrator,
        locks,
        workspace,
        audit,
        registry,
        filing,
        questions,
        client: UserId::new(),
        auditor: UserId::new(),
    }
}

/// Answer every question of the harness filing through the locked save path.
pub async fn answer_all(h: &Harness, text: &str) {
    for question in &h.questions {
        h.workspace
            .open_draft(h.filing.id, question.id, h.client, Role::Client)
            .await
            .unwrap();
        h.locks
            .acquire(h.filing.id, question.id, h.client)
            .await
            .unwrap();
        h.workspace
            .save_draft(
                h.filing.id,
                question.id,
                h.client,
                Role::Client,
                text.to_string(),
            )
            .await
            .unwrap();
        h.locks
            .release(h.filing.id, question.id, h.client)
            .await
            .unwrap();
    }
}

pub async fn submit(h: &Harness) -> Result<TransitionOutcome, WorkflowError> {
    h.orchestrator
        .transition(TransitionRequest::new(
            h.filing.id,
            Role::Client,
            WorkflowAction::Submit,
            h.client,
        ))
        .await
}

pub async fn advance(h: &Harness) -> Result<TransitionOutcome, WorkflowError> {
    h.orchestrator
        .transition(TransitionRequest::new(
            h.filing.id,
            Role::Auditor,
            WorkflowAction::Advance,
            h.auditor,
        ))
        .await
}

pub async fn finalize(h: &Harness) -> Result<TransitionOutcome, WorkflowError> {
    h.orchestrator
        .transition(TransitionRequest::new(
            h.filing.id,
            Role::Auditor,
            WorkflowAction::Finalize,
            h.auditor,
        ))
        .await
}
