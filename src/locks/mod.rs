// Per-question collaborative lock: TTL mutual exclusion for the "save
// draft" path. Expiry is detected lazily on every access; there is no
// background sweeper.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::models::{FilingId, QuestionId, QuestionLockRecord, UserId};
use crate::status::Role;
use crate::storage::{ReviewStore, StoreError};
use crate::workflow::WorkflowError;

/// What a viewer is allowed to know about a lock. Holder identity is only
/// exposed to privileged roles or members of the owning project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockStatus {
    pub held: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub holder: Option<UserId>,
}

pub struct QuestionLockService {
    store: Arc<dyn ReviewStore>,
    ttl: Duration,
}

impl QuestionLockService {
    pub fn new(store: Arc<dyn ReviewStore>, ttl: std::time::Duration) -> Self {
        let ttl = Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(60));
        Self { store, ttl }
    }

    fn fresh_record(
        &self,
        filing: FilingId,
        question: QuestionId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> QuestionLockRecord {
        QuestionLockRecord {
            filing_id: filing,
            question_id: question,
            holder: user,
            expires_at: now + self.ttl,
        }
    }

    /// Take or renew the lock. Unlocked or expired locks are taken over;
    /// the current holder renews; anyone else gets `LockHeld` naming the
    /// real holder and expiry.
    pub async fn acquire(
        &self,
        filing: FilingId,
        question: QuestionId,
        user: UserId,
    ) -> Result<QuestionLockRecord, WorkflowError> {
        let now = Utc::now();
        let fresh = self.fresh_record(filing, question, user, now);

        match self.store.question_lock(filing, question).await? {
            None => match self.store.insert_question_lock(fresh.clone()).await {
                Ok(()) => {
                    debug!(filing = %filing, question = %question, holder = %user, "lock acquired");
                    Ok(fresh)
                }
                // Lost the create race; report whoever actually won it.
                Err(StoreError::Duplicate(_)) => self.lost_race(filing, question).await,
                Err(err) => Err(err.into()),
            },
            Some(current) if current.holder == user || current.is_expired(now) => {
                match self
                    .store
                    .replace_question_lock(fresh.clone(), &current)
                    .await
                {
                    Ok(()) => {
                        debug!(filing = %filing, question = %question, holder = %user, "lock taken over");
                        Ok(fresh)
                    }
                    Err(StoreError::Stale(_)) => self.lost_race(filing, question).await,
                    Err(err) => Err(err.into()),
                }
            }
            Some(current) => Err(WorkflowError::LockHeld {
                holder: Some(current.holder),
                expires_at: current.expires_at,
            }),
        }
    }

    async fn lost_race(
        &self,
        filing: FilingId,
        question: QuestionId,
    ) -> Result<QuestionLockRecord, WorkflowError> {
        match self.store.question_lock(filing, question).await? {
            Some(winner) => Err(WorkflowError::LockHeld {
                holder: Some(winner.holder),
                expires_at: winner.expires_at,
            }),
            None => Err(WorkflowError::Conflict),
        }
    }

    /// Extend the TTL. Only the current non-expired holder may do this.
    pub async fn heartbeat(
        &self,
        filing: FilingId,
        question: QuestionId,
        user: UserId,
    ) -> Result<QuestionLockRecord, WorkflowError> {
        let now = Utc::now();
        match self.store.question_lock(filing, question).await? {
            None => Err(WorkflowError::LockNotHeldOrExpired),
            Some(current) if current.is_expired(now) => Err(WorkflowError::LockNotHeldOrExpired),
            Some(current) if current.holder != user => Err(WorkflowError::LockHeld {
                holder: Some(current.holder),
                expires_at: current.expires_at,
            }),
            Some(current) => {
                let renewed = self.fresh_record(filing, question, user, now);
                match self
                    .store
                    .replace_question_lock(renewed.clone(), &current)
                    .await
                {
                    Ok(()) => Ok(renewed),
                    Err(StoreError::Stale(_)) => Err(WorkflowError::LockNotHeldOrExpired),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Delete the record if the caller holds it, or clean up an expired
    /// one. Releasing someone else's active lock is a silent no-op.
    pub async fn release(
        &self,
        filing: FilingId,
        question: QuestionId,
        user: UserId,
    ) -> Result<(), WorkflowError> {
        let now = Utc::now();
        match self.store.question_lock(filing, question).await? {
            None => Ok(()),
            Some(current) if current.holder == user => {
                self.store
                    .delete_question_lock(filing, question, Some(user))
                    .await?;
                debug!(filing = %filing, question = %question, "lock released");
                Ok(())
            }
            Some(current) if current.is_expired(now) => {
                // Expired lock cleanup on behalf of whoever notices first.
                self.store
                    .delete_question_lock(filing, question, Some(current.holder))
                    .await?;
                Ok(())
            }
            Some(_) => Ok(()),
        }
    }

    /// Gate for the draft save path: requires an active lock owned by the
    /// caller, optionally refreshing the TTL on success.
    pub async fn ensure_lock_held(
        &self,
        filing: FilingId,
        question: QuestionId,
        user: UserId,
        refresh: bool,
    ) -> Result<(), WorkflowError> {
        let now = Utc::now();
        match self.store.question_lock(filing, question).await? {
            None => Err(WorkflowError::LockNotHeldOrExpired),
            Some(current) if current.is_expired(now) => Err(WorkflowError::LockNotHeldOrExpired),
            Some(current) if current.holder != user => Err(WorkflowError::LockHeld {
                holder: Some(current.holder),
                expires_at: current.expires_at,
            }),
            Some(current) => {
                if refresh {
                    let renewed = self.fresh_record(filing, question, user, now);
                    if let Err(StoreError::Stale(_)) = self
                        .store
                        .replace_question_lock(renewed, &current)
                        .await
                    {
                        return Err(WorkflowError::LockNotHeldOrExpired);
                    }
                }
                Ok(())
            }
        }
    }

    /// Lock visibility for a viewer. Auditors, admins and members of the
    /// owning project see the holder; everyone else gets held/expiry only.
    pub async fn status(
        &self,
        filing: FilingId,
        question: QuestionId,
        viewer_role: Role,
        is_project_member: bool,
    ) -> Result<LockStatus, WorkflowError> {
        let now = Utc::now();
        let privileged =
            matches!(viewer_role, Role::Auditor | Role::Admin) || is_project_member;
        match self.store.question_lock(filing, question).await? {
            Some(current) if !current.is_expired(now) => Ok(LockStatus {
                held: true,
                expires_at: Some(current.expires_at),
                holder: privileged.then_some(current.holder),
            }),
            _ => Ok(LockStatus {
                held: false,
                expires_at: None,
                holder: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn service(store: Arc<dyn ReviewStore>) -> QuestionLockService {
        QuestionLockService::new(store, std::time::Duration::from_secs(60))
    }

    #[tokio::test]
    async fn acquire_renew_and_blocked_second_user() {
        let store: Arc<dyn ReviewStore> = Arc::new(InMemoryStore::new());
        let locks = service(Arc::clone(&store));
        let (f, q) = (FilingId::new(), QuestionId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        let held = locks.acquire(f, q, alice).await.unwrap();
        assert_eq!(held.holder, alice);

        // Same holder renews.
        let renewed = locks.acquire(f, q, alice).await.unwrap();
        assert!(renewed.expires_at >= held.expires_at);

        // Different user is told who holds it.
        match locks.acquire(f, q, bob).await {
            Err(WorkflowError::LockHeld { holder, .. }) => assert_eq!(holder, Some(alice)),
            other => panic!("expected LockHeld, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_lock_is_taken_over_lazily() {
        let store = Arc::new(InMemoryStore::new());
        let locks = service(store.clone());
        let (f, q) = (FilingId::new(), QuestionId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        store
            .insert_question_lock(QuestionLockRecord {
                filing_id: f,
                question_id: q,
                holder: alice,
                expires_at: Utc::now() - Duration::seconds(5),
            })
            .await
            .unwrap();

        let held = locks.acquire(f, q, bob).await.unwrap();
        assert_eq!(held.holder, bob);
    }

    #[tokio::test]
    async fn heartbeat_requires_the_active_holder() {
        let store = Arc::new(InMemoryStore::new());
        let locks = service(store.clone());
        let (f, q) = (FilingId::new(), QuestionId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        assert!(matches!(
            locks.heartbeat(f, q, alice).await,
            Err(WorkflowError::LockNotHeldOrExpired)
        ));

        locks.acquire(f, q, alice).await.unwrap();
        assert!(locks.heartbeat(f, q, alice).await.is_ok());
        assert!(matches!(
            locks.heartbeat(f, q, bob).await,
            Err(WorkflowError::LockHeld { .. })
        ));

        store
            .replace_question_lock(
                QuestionLockRecord {
                    filing_id: f,
                    question_id: q,
                    holder: alice,
                    expires_at: Utc::now() - Duration::seconds(1),
                },
                &store.question_lock(f, q).await.unwrap().unwrap(),
            )
            .await
            .unwrap();
        assert!(matches!(
            locks.heartbeat(f, q, alice).await,
            Err(WorkflowError::LockNotHeldOrExpired)
        ));
    }

    #[tokio::test]
    async fn release_is_silent_for_non_holders() {
        let store = Arc::new(InMemoryStore::new());
        let locks = service(store.clone());
        let (f, q) = (FilingId::new(), QuestionId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        locks.acquire(f, q, alice).await.unwrap();
        locks.release(f, q, bob).await.unwrap();
        assert!(store.question_lock(f, q).await.unwrap().is_some());

        locks.release(f, q, alice).await.unwrap();
        assert!(store.question_lock(f, q).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ensure_lock_held_gates_the_save_path() {
        let store: Arc<dyn ReviewStore> = Arc::new(InMemoryStore::new());
        let locks = service(Arc::clone(&store));
        let (f, q) = (FilingId::new(), QuestionId::new());
        let (alice, bob) = (UserId::new(), UserId::new());

        assert!(matches!(
            locks.ensure_lock_held(f, q, alice, false).await,
            Err(WorkflowError::LockNotHeldOrExpired)
        ));
        locks.acquire(f, q, alice).await.unwrap();
        locks.ensure_lock_held(f, q, alice, true).await.unwrap();
        assert!(matches!(
            locks.ensure_lock_held(f, q, bob, false).await,
            Err(WorkflowError::LockHeld { .. })
        ));
    }

    #[tokio::test]
    async fn holder_identity_is_hidden_from_outsiders() {
        let store: Arc<dyn ReviewStore> = Arc::new(InMemoryStore::new());
        let locks = service(Arc::clone(&store));
        let (f, q) = (FilingId::new(), QuestionId::new());
        let alice = UserId::new();

        locks.acquire(f, q, alice).await.unwrap();

        let outsider = locks.status(f, q, Role::Client, false).await.unwrap();
        assert!(outsider.held);
        assert!(outsider.expires_at.is_some());
        assert_eq!(outsider.holder, None);

        let member = locks.status(f, q, Role::Client, true).await.unwrap();
        assert_eq!(member.holder, Some(alice));

        let auditor = locks.status(f, q, Role::Auditor, false).await.unwrap();
        assert_eq!(auditor.holder, Some(alice));
    }
}
