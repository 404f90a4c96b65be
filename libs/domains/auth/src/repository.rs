use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{PasswordHistory, User, UserType};

/// Repository trait for User persistence.
///
/// Implementations are expected to run each call inside one transaction of
/// the backing store; the service layer sequences calls but relies on the
/// store's isolation to prevent lost updates between them.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Persist a new user
    async fn create(&self, user: User) -> UserResult<User>;

    /// Find a user by ID, including soft-deleted ones
    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>>;

    /// Find a non-deleted user by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>>;

    /// Find a non-deleted user by external provider identity
    async fn find_by_provider(&self, provider: &str, provider_id: &str)
    -> UserResult<Option<User>>;

    /// List non-deleted users of the given type
    async fn list_by_type(&self, user_type: UserType) -> UserResult<Vec<User>>;

    /// Replace an existing user row
    async fn save(&self, user: User) -> UserResult<User>;

    /// Mark a user soft-deleted and return the updated row
    async fn soft_delete(&self, id: Uuid) -> UserResult<User>;

    /// Clear the soft-delete marker and return the updated row. Fails with
    /// `DuplicateEmail` when the email was claimed by another live user in
    /// the meantime.
    async fn restore(&self, id: Uuid) -> UserResult<User>;

    /// Permanently remove the user and all owned password history
    async fn hard_delete(&self, id: Uuid) -> UserResult<bool>;

    /// Append an entry to the password history log
    async fn append_history(&self, entry: PasswordHistory) -> UserResult<PasswordHistory>;

    /// The most recent `limit` history entries, newest first
    async fn recent_history(&self, user_id: Uuid, limit: usize)
    -> UserResult<Vec<PasswordHistory>>;
}

#[derive(Debug, Default)]
struct Store {
    users: HashMap<Uuid, User>,
    histories: HashMap<Uuid, Vec<PasswordHistory>>,
}

/// In-memory implementation of [`UserRepository`] (for development/testing).
///
/// The user rows and the history log live behind one lock, so a sequence of
/// writes from a single service operation is never interleaved with another.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(store: &Store, email: &str, exclude: Option<Uuid>) -> bool {
    store.users.values().any(|u| {
        Some(u.id) != exclude
            && !u.is_deleted()
            && u.email
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(email))
    })
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> UserResult<User> {
        let mut store = self.store.write().await;

        if let Some(email) = user.email.as_deref() {
            if email_taken(&store, email, None) {
                return Err(UserError::DuplicateEmail(email.to_string()));
            }
        }

        store.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, user_type = %user.user_type, "Created user");
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> UserResult<Option<User>> {
        let store = self.store.read().await;
        let user = store
            .users
            .values()
            .find(|u| {
                !u.is_deleted()
                    && u.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned();
        Ok(user)
    }

    async fn find_by_provider(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> UserResult<Option<User>> {
        let store = self.store.read().await;
        let user = store
            .users
            .values()
            .find(|u| {
                !u.is_deleted()
                    && u.provider.as_deref() == Some(provider)
                    && u.provider_id.as_deref() == Some(provider_id)
            })
            .cloned();
        Ok(user)
    }

    async fn list_by_type(&self, user_type: UserType) -> UserResult<Vec<User>> {
        let store = self.store.read().await;

        let mut result: Vec<User> = store
            .users
            .values()
            .filter(|u| !u.is_deleted() && u.user_type == user_type)
            .cloned()
            .collect();

        // Newest first
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(result)
    }

    async fn save(&self, user: User) -> UserResult<User> {
        let mut store = self.store.write().await;

        if !store.users.contains_key(&user.id) {
            return Err(UserError::NotFound(user.id));
        }

        if let Some(email) = user.email.as_deref() {
            if email_taken(&store, email, Some(user.id)) {
                return Err(UserError::DuplicateEmail(email.to_string()));
            }
        }

        store.users.insert(user.id, user.clone());

        tracing::info!(user_id = %user.id, "Updated user");
        Ok(user)
    }

    async fn soft_delete(&self, id: Uuid) -> UserResult<User> {
        let mut store = self.store.write().await;

        let user = store.users.get_mut(&id).ok_or(UserError::NotFound(id))?;
        user.deleted_at = Some(Utc::now());
        let user = user.clone();

        tracing::info!(user_id = %id, "Soft-deleted user");
        Ok(user)
    }

    async fn restore(&self, id: Uuid) -> UserResult<User> {
        let mut store = self.store.write().await;

        // The email was only unique among live users while this row was
        // deleted; re-check before bringing it back
        let email = store
            .users
            .get(&id)
            .ok_or(UserError::NotFound(id))?
            .email
            .clone();
        if let Some(email) = email.as_deref() {
            if email_taken(&store, email, Some(id)) {
                return Err(UserError::DuplicateEmail(email.to_string()));
            }
        }

        let user = store.users.get_mut(&id).ok_or(UserError::NotFound(id))?;
        user.deleted_at = None;
        let user = user.clone();

        tracing::info!(user_id = %id, "Restored user");
        Ok(user)
    }

    async fn hard_delete(&self, id: Uuid) -> UserResult<bool> {
        let mut store = self.store.write().await;

        let removed = store.users.remove(&id).is_some();
        // Ownership cascade: the history log goes with the user
        store.histories.remove(&id);

        if removed {
            tracing::info!(user_id = %id, "Permanently deleted user");
        }
        Ok(removed)
    }

    async fn append_history(&self, entry: PasswordHistory) -> UserResult<PasswordHistory> {
        let mut store = self.store.write().await;

        store
            .histories
            .entry(entry.user_id)
            .or_default()
            .push(entry.clone());

        tracing::debug!(user_id = %entry.user_id, "Logged password history entry");
        Ok(entry)
    }

    async fn recent_history(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> UserResult<Vec<PasswordHistory>> {
        let store = self.store.read().await;

        let entries = store
            .histories
            .get(&user_id)
            .map(|log| log.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default();

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_email(email: &str) -> User {
        let mut user = User::new(UserType::User, "Test User".to_string());
        user.email = Some(email.to_string());
        user
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let repo = InMemoryUserRepository::new();

        let created = repo.create(user_with_email("test@example.com")).await.unwrap();

        let fetched = repo.find_by_id(created.id).await.unwrap();
        assert_eq!(fetched.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn test_find_by_email_case_insensitive() {
        let repo = InMemoryUserRepository::new();
        repo.create(user_with_email("test@example.com")).await.unwrap();

        assert!(repo.find_by_email("TEST@EXAMPLE.COM").await.unwrap().is_some());
        assert!(repo.find_by_email("other@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_email_skips_soft_deleted() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(user_with_email("test@example.com")).await.unwrap();

        repo.soft_delete(user.id).await.unwrap();

        assert!(repo.find_by_email("test@example.com").await.unwrap().is_none());
        // find_by_id still resolves, restore needs it
        assert!(repo.find_by_id(user.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = InMemoryUserRepository::new();
        repo.create(user_with_email("test@example.com")).await.unwrap();

        let result = repo.create(user_with_email("TEST@example.com")).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));
    }

    #[tokio::test]
    async fn test_save_keeps_own_email() {
        let repo = InMemoryUserRepository::new();
        let mut user = repo.create(user_with_email("test@example.com")).await.unwrap();

        user.name = "Renamed".to_string();
        let saved = repo.save(user).await.unwrap();
        assert_eq!(saved.name, "Renamed");
    }

    #[tokio::test]
    async fn test_save_unknown_user_is_not_found() {
        let repo = InMemoryUserRepository::new();
        let user = user_with_email("test@example.com");

        let result = repo.save(user).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_by_provider() {
        let repo = InMemoryUserRepository::new();
        let mut user = User::new(UserType::User, "Social".to_string());
        user.provider = Some("google".to_string());
        user.provider_id = Some("g-123".to_string());
        repo.create(user).await.unwrap();

        assert!(repo.find_by_provider("google", "g-123").await.unwrap().is_some());
        assert!(repo.find_by_provider("google", "g-456").await.unwrap().is_none());
        assert!(repo.find_by_provider("github", "g-123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_type_excludes_deleted() {
        let repo = InMemoryUserRepository::new();
        let admin = repo
            .create(User::new(UserType::Admin, "Admin".to_string()))
            .await
            .unwrap();
        let user = repo
            .create(User::new(UserType::User, "User".to_string()))
            .await
            .unwrap();
        repo.soft_delete(user.id).await.unwrap();

        let admins = repo.list_by_type(UserType::Admin).await.unwrap();
        assert_eq!(admins.len(), 1);
        assert_eq!(admins[0].id, admin.id);

        let users = repo.list_by_type(UserType::User).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_recent_history_newest_first_with_limit() {
        let repo = InMemoryUserRepository::new();
        let user_id = Uuid::now_v7();

        for i in 0..4 {
            repo.append_history(PasswordHistory::new(user_id, format!("hash-{}", i)))
                .await
                .unwrap();
        }

        let recent = repo.recent_history(user_id, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].password_hash, "hash-3");
        assert_eq!(recent[2].password_hash, "hash-1");
    }

    #[tokio::test]
    async fn test_restore_rejects_email_reclaimed_by_live_user() {
        let repo = InMemoryUserRepository::new();
        let first = repo.create(user_with_email("dup@example.com")).await.unwrap();
        repo.soft_delete(first.id).await.unwrap();

        // The address is free again while the first row is deleted
        let second = repo.create(user_with_email("dup@example.com")).await.unwrap();

        let result = repo.restore(first.id).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(_))));

        // The first row stays deleted, the live one keeps the address
        assert!(repo.find_by_id(first.id).await.unwrap().unwrap().is_deleted());
        assert_eq!(
            repo.find_by_email("dup@example.com").await.unwrap().unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_hard_delete_cascades_history() {
        let repo = InMemoryUserRepository::new();
        let user = repo.create(user_with_email("test@example.com")).await.unwrap();
        repo.append_history(PasswordHistory::new(user.id, "hash".to_string()))
            .await
            .unwrap();

        assert!(repo.hard_delete(user.id).await.unwrap());
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
        assert!(repo.recent_history(user.id, 10).await.unwrap().is_empty());

        // Second delete finds nothing
        assert!(!repo.hard_delete(user.id).await.unwrap());
    }
}
