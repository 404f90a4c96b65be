use std::sync::Arc;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::hasher::CredentialHasher;
use crate::models::User;
use crate::repository::UserRepository;

/// How to resolve the user whose history is being checked
#[derive(Debug, Clone)]
pub enum UserRef {
    Id(Uuid),
    Email(String),
}

impl From<Uuid> for UserRef {
    fn from(id: Uuid) -> Self {
        UserRef::Id(id)
    }
}

/// Read-only reuse check against the last N stored password hashes.
///
/// The policy never writes; appending to the history happens in
/// [`crate::service::UserService`] after a password is durably changed.
pub struct PasswordHistoryPolicy<R: UserRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn CredentialHasher>,
    retention: usize,
}

impl<R: UserRepository> PasswordHistoryPolicy<R> {
    pub fn new(repository: Arc<R>, hasher: Arc<dyn CredentialHasher>, retention: usize) -> Self {
        Self {
            repository,
            hasher,
            retention,
        }
    }

    /// Retention window size; 0 means the feature is disabled
    pub fn retention(&self) -> usize {
        self.retention
    }

    pub fn is_enabled(&self) -> bool {
        self.retention > 0
    }

    /// Whether `candidate` matches any of the user's last `retention` stored
    /// hashes.
    ///
    /// With the feature disabled this accepts without resolving the user.
    /// Otherwise an unresolvable user fails closed with a not-found error
    /// instead of silently passing.
    pub async fn is_reused(&self, user: &UserRef, candidate: &str) -> UserResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let user = self.resolve(user).await?;

        let histories = self
            .repository
            .recent_history(user.id, self.retention)
            .await?;

        for history in &histories {
            if self.hasher.verify(candidate, &history.password_hash)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn resolve(&self, user: &UserRef) -> UserResult<User> {
        match user {
            UserRef::Id(id) => self
                .repository
                .find_by_id(*id)
                .await?
                .ok_or(UserError::NotFound(*id)),
            UserRef::Email(email) => self
                .repository
                .find_by_email(email)
                .await?
                .ok_or_else(|| UserError::NotFoundByEmail(email.clone())),
        }
    }
}
