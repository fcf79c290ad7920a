//! Question lock contention tests: concurrent acquires, the lock-gated
//! save path, and TTL takeover.

mod fixtures;

use futures::future::join_all;
use redline::{Role, UserId, WorkflowError};

use fixtures::harness;

#[tokio::test]
async fn concurrent_acquires_have_exactly_one_winner() {
    let h = harness(2).await;
    let question = h.questions[0].id;
    let users: Vec<UserId> = (0..8).map(|_| UserId::new()).collect();

    let attempts = join_all(users.iter().map(|user| {
        let locks = h.locks.clone();
        let filing = h.filing.id;
        let user = *user;
        async move { (user, locks.acquire(filing, question, user).await) }
    }))
    .await;

    let winners: Vec<UserId> = attempts
        .iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(user, _)| *user)
        .collect();
    assert_eq!(winners.len(), 1, "exactly one acquire may win");
    let winner = winners[0];

    // Every loser is told who actually holds the lock.
    for (user, result) in attempts {
        if user == winner {
            continue;
        }
        match result {
            Err(WorkflowError::LockHeld { holder, .. }) => assert_eq!(holder, Some(winner)),
            other => panic!("loser should see LockHeld, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn save_draft_without_lock_is_a_lock_violation() {
    let h = harness(2).await;
    let question = h.questions[0].id;
    h.workspace
        .open_draft(h.filing.id, question, h.client, Role::Client)
        .await
        .unwrap();

    let err = h
        .workspace
        .save_draft(
            h.filing.id,
            question,
            h.client,
            Role::Client,
            "unlocked write".to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::LockNotHeldOrExpired));
    assert_eq!(err.http_status(), 409);
}

#[tokio::test]
async fn save_draft_under_someone_elses_lock_names_the_holder() {
    let h = harness(2).await;
    let question = h.questions[0].id;
    let other = UserId::new();

    h.locks.acquire(h.filing.id, question, other).await.unwrap();
    let err = h
        .workspace
        .save_draft(
            h.filing.id,
            question,
            h.client,
            Role::Client,
            "contended write".to_string(),
        )
        .await
        .unwrap_err();
    match err {
        WorkflowError::LockHeld { holder, .. } => assert_eq!(holder, Some(other)),
        other => panic!("expected LockHeld, got {other:?}"),
    }
}

#[tokio::test]
async fn save_refreshes_the_ttl() {
    let h = harness(2).await;
    let question = h.questions[0].id;

    let held = h
        .locks
        .acquire(h.filing.id, question, h.client)
        .await
        .unwrap();
    h.workspace
        .open_draft(h.filing.id, question, h.client, Role::Client)
        .await
        .unwrap();
    h.workspace
        .save_draft(
            h.filing.id,
            question,
            h.client,
            Role::Client,
            "text".to_string(),
        )
        .await
        .unwrap();

    let status = h
        .locks
        .status(h.filing.id, question, Role::Admin, false)
        .await
        .unwrap();
    assert!(status.held);
    assert!(status.expires_at.unwrap() >= held.expires_at);
}
