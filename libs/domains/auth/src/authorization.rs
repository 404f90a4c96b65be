use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::UserResult;

/// Role/permission assignment, consumed as an external collaborator.
///
/// `sync_*` replaces the full assigned set with exactly the given set;
/// `attach_roles` adds without removing existing members.
#[async_trait]
pub trait AuthorizationGateway: Send + Sync {
    async fn sync_roles(&self, user_id: Uuid, roles: &[String]) -> UserResult<()>;

    async fn attach_roles(&self, user_id: Uuid, roles: &[String]) -> UserResult<()>;

    async fn sync_permissions(&self, user_id: Uuid, permissions: &[String]) -> UserResult<()>;
}

#[derive(Debug, Default)]
struct Grants {
    roles: HashMap<Uuid, BTreeSet<String>>,
    permissions: HashMap<Uuid, BTreeSet<String>>,
}

/// In-memory implementation of [`AuthorizationGateway`] (for development/
/// testing)
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuthorizationGateway {
    grants: Arc<RwLock<Grants>>,
}

impl InMemoryAuthorizationGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn roles_of(&self, user_id: Uuid) -> Vec<String> {
        let grants = self.grants.read().await;
        grants
            .roles
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn permissions_of(&self, user_id: Uuid) -> Vec<String> {
        let grants = self.grants.read().await;
        grants
            .permissions
            .get(&user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AuthorizationGateway for InMemoryAuthorizationGateway {
    async fn sync_roles(&self, user_id: Uuid, roles: &[String]) -> UserResult<()> {
        let mut grants = self.grants.write().await;
        grants
            .roles
            .insert(user_id, roles.iter().cloned().collect());

        tracing::debug!(user_id = %user_id, count = roles.len(), "Synced roles");
        Ok(())
    }

    async fn attach_roles(&self, user_id: Uuid, roles: &[String]) -> UserResult<()> {
        let mut grants = self.grants.write().await;
        grants
            .roles
            .entry(user_id)
            .or_default()
            .extend(roles.iter().cloned());

        tracing::debug!(user_id = %user_id, count = roles.len(), "Attached roles");
        Ok(())
    }

    async fn sync_permissions(&self, user_id: Uuid, permissions: &[String]) -> UserResult<()> {
        let mut grants = self.grants.write().await;
        grants
            .permissions
            .insert(user_id, permissions.iter().cloned().collect());

        tracing::debug!(user_id = %user_id, count = permissions.len(), "Synced permissions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sync_replaces_full_set() {
        let gateway = InMemoryAuthorizationGateway::new();
        let user_id = Uuid::now_v7();

        gateway
            .sync_roles(user_id, &names(&["broker", "expert"]))
            .await
            .unwrap();
        gateway.sync_roles(user_id, &names(&["coordinator"])).await.unwrap();

        assert_eq!(gateway.roles_of(user_id).await, names(&["coordinator"]));
    }

    #[tokio::test]
    async fn test_attach_keeps_existing_members() {
        let gateway = InMemoryAuthorizationGateway::new();
        let user_id = Uuid::now_v7();

        gateway.sync_roles(user_id, &names(&["broker"])).await.unwrap();
        gateway.attach_roles(user_id, &names(&["expert"])).await.unwrap();

        assert_eq!(gateway.roles_of(user_id).await, names(&["broker", "expert"]));
    }

    #[tokio::test]
    async fn test_permissions_independent_of_roles() {
        let gateway = InMemoryAuthorizationGateway::new();
        let user_id = Uuid::now_v7();

        gateway
            .sync_permissions(user_id, &names(&["users.view"]))
            .await
            .unwrap();

        assert!(gateway.roles_of(user_id).await.is_empty());
        assert_eq!(gateway.permissions_of(user_id).await, names(&["users.view"]));
    }
}
