// Identity collaborator: resolves roles and project membership from opaque
// user references. Auth mechanics live outside the core.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

use crate::models::{ProjectId, UserId};
use crate::status::Role;

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// The acting role of a user, or `None` for unknown users.
    async fn role_of(&self, user: UserId) -> anyhow::Result<Option<Role>>;
    async fn is_project_member(&self, user: UserId, project: ProjectId) -> anyhow::Result<bool>;
}

/// In-memory directory for tests and demos.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    roles: Mutex<HashMap<UserId, Role>>,
    memberships: Mutex<HashSet<(UserId, ProjectId)>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: UserId, role: Role) {
        self.roles.lock().await.insert(user, role);
    }

    pub async fn add_member(&self, user: UserId, project: ProjectId) {
        self.memberships.lock().await.insert((user, project));
    }
}

#[async_trait]
impl IdentityResolver for StaticDirectory {
    async fn role_of(&self, user: UserId) -> anyhow::Result<Option<Role>> {
        Ok(self.roles.lock().await.get(&user).copied())
    }

    async fn is_project_member(&self, user: UserId, project: ProjectId) -> anyhow::Result<bool> {
        Ok(self.memberships.lock().await.contains(&(user, project)))
    }
}
