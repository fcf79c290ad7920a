//! Snapshot service tests: idempotency per (filing, round), prerequisite
//! enforcement, and carry-forward through the draft spawner.

mod fixtures;

use redline::{
    DraftSpawner, FilingStatus, ReviewStore, ReviewTx, Role, SnapshotService, WorkflowError,
};

use fixtures::{advance, answer_all, harness, submit};

#[tokio::test]
async fn snapshotting_twice_yields_one_submission_and_one_link_per_question() {
    let h = harness(2).await;
    answer_all(&h, "answer").await;

    let service = SnapshotService::new(h.plan);
    let filing = h.store.filing(h.filing.id).await.unwrap().unwrap();

    let mut tx = h.store.begin().await.unwrap();
    let first = service.create_snapshot(&mut *tx, &filing, 1).await.unwrap();
    let second = service.create_snapshot(&mut *tx, &filing, 1).await.unwrap();
    assert_eq!(first.id, second.id);
    tx.commit().await.unwrap();

    let submission = h.store.submission(h.filing.id, 1).await.unwrap().unwrap();
    let links = h.store.submission_answers(submission.id).await.unwrap();
    assert_eq!(links.len(), h.questions.len());

    // And once more in a fresh transaction against the committed state.
    let mut tx = h.store.begin().await.unwrap();
    service.create_snapshot(&mut *tx, &filing, 1).await.unwrap();
    tx.commit().await.unwrap();
    let links = h.store.submission_answers(submission.id).await.unwrap();
    assert_eq!(links.len(), h.questions.len());
}

#[tokio::test]
async fn missing_draft_fails_prereq_naming_the_question() {
    let h = harness(2).await;
    // Answer only the first question.
    let question = &h.questions[0];
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
            "partial".to_string(),
        )
        .await
        .unwrap();

    let err = submit(&h).await.unwrap_err();
    match err {
        WorkflowError::PrereqFailed { question, detail } => {
            assert_eq!(question, h.questions[1].id);
            assert!(detail.contains("Retention policy"));
        }
        other => panic!("expected PrereqFailed, got {other:?}"),
    }
    // Validation rejected before any write.
    assert!(h.store.submission(h.filing.id, 1).await.unwrap().is_none());
    assert_eq!(
        h.store.filing(h.filing.id).await.unwrap().unwrap().status,
        FilingStatus::Draft
    );
}

#[tokio::test]
async fn blank_draft_counts_as_missing() {
    let h = harness(2).await;
    answer_all(&h, "   ").await;
    let err = submit(&h).await.unwrap_err();
    assert!(matches!(err, WorkflowError::PrereqFailed { .. }));
}

#[tokio::test]
async fn round_out_of_bounds_is_rejected() {
    let h = harness(2).await;
    answer_all(&h, "answer").await;
    let service = SnapshotService::new(h.plan);
    let filing = h.store.filing(h.filing.id).await.unwrap().unwrap();

    let mut tx = h.store.begin().await.unwrap();
    assert!(matches!(
        service.create_snapshot(&mut *tx, &filing, 0).await,
        Err(WorkflowError::RoundOutOfBounds { .. })
    ));
    assert!(matches!(
        service.create_snapshot(&mut *tx, &filing, 3).await,
        Err(WorkflowError::RoundOutOfBounds { .. })
    ));
}

#[tokio::test]
async fn untouched_answer_survives_spawn_then_next_snapshot_unchanged() {
    let h = harness(4).await;
    answer_all(&h, "the original wording").await;
    submit(&h).await.unwrap();
    advance(&h).await.unwrap();

    // Client touches nothing during v2; submitting freezes round 3.
    submit(&h).await.unwrap();

    let round3 = h.store.submission(h.filing.id, 3).await.unwrap().unwrap();
    let links = h.store.submission_answers(round3.id).await.unwrap();
    assert_eq!(links.len(), h.questions.len());
    for link in links {
        let snapshot = h.store.revision(link.answer_revision_id).await.unwrap().unwrap();
        assert_eq!(snapshot.answer_text, "the original wording");
        assert!(!snapshot.is_draft);
    }
}

#[tokio::test]
async fn spawner_rejects_non_review_boundaries_and_is_rerunnable() {
    let h = harness(4).await;
    answer_all(&h, "answer").await;
    submit(&h).await.unwrap();

    let spawner = DraftSpawner::new(h.plan);
    let filing = h.store.filing(h.filing.id).await.unwrap().unwrap();

    let mut tx = h.store.begin().await.unwrap();
    // Even -> odd is a client submit boundary, not a review handback.
    assert!(matches!(
        spawner.refresh_drafts(&mut *tx, &filing, 2, 3).await,
        Err(WorkflowError::InvalidStatus(_))
    ));
    assert!(matches!(
        spawner.refresh_drafts(&mut *tx, &filing, 1, 3).await,
        Err(WorkflowError::InvalidStatus(_))
    ));

    // Re-running the same boundary must not duplicate drafts.
    spawner.refresh_drafts(&mut *tx, &filing, 1, 2).await.unwrap();
    spawner.refresh_drafts(&mut *tx, &filing, 1, 2).await.unwrap();
    let drafts = tx.drafts(h.filing.id).await.unwrap();
    assert_eq!(drafts.len(), h.questions.len());
    for draft in drafts {
        assert_eq!(draft.revision_index, 2);
    }
}
