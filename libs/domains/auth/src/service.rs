use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::authorization::AuthorizationGateway;
use crate::config::AccessConfig;
use crate::error::{UserError, UserResult};
use crate::events::{EventSink, UserEvent};
use crate::hasher::CredentialHasher;
use crate::models::{
    ChangePassword, CreateUser, PasswordHistory, UpdateProfile, UpdateUser, User, UserType,
};
use crate::notifier::{UserNotifier, generate_token};
use crate::password_history::{PasswordHistoryPolicy, UserRef};
use crate::repository::UserRepository;

const CREATE_FAILED: &str = "There was a problem creating this user. Please try again.";
const REGISTER_FAILED: &str = "There was a problem creating your account.";
const UPDATE_FAILED: &str = "There was a problem updating this user. Please try again.";
const DELETE_FAILED: &str = "There was a problem deleting this user. Please try again.";
const RESTORE_FAILED: &str = "There was a problem restoring this user. Please try again.";
const DESTROY_FAILED: &str = "There was a problem permanently deleting this user. Please try again.";

/// Single choke point for user state transitions.
///
/// Every mutating operation either fully succeeds (commit + event) or fully
/// fails (domain error, no event). The acting principal is always passed in
/// explicitly; nothing is read from ambient state.
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    hasher: Arc<dyn CredentialHasher>,
    authorization: Arc<dyn AuthorizationGateway>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn UserNotifier>,
    policy: PasswordHistoryPolicy<R>,
    config: AccessConfig,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(
        repository: R,
        hasher: Arc<dyn CredentialHasher>,
        authorization: Arc<dyn AuthorizationGateway>,
        events: Arc<dyn EventSink>,
        notifier: Arc<dyn UserNotifier>,
        config: AccessConfig,
    ) -> Self {
        let repository = Arc::new(repository);
        let policy =
            PasswordHistoryPolicy::new(repository.clone(), hasher.clone(), config.password_history);

        Self {
            repository,
            hasher,
            authorization,
            events,
            notifier,
            policy,
            config,
        }
    }

    pub fn password_policy(&self) -> &PasswordHistoryPolicy<R> {
        &self.policy
    }

    /// Get a user by ID (soft-deleted users still resolve; the mutating
    /// operations guard on the deletion marker themselves)
    pub async fn get_user(&self, id: Uuid) -> UserResult<User> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }

    /// Get a non-deleted user by email
    pub async fn get_user_by_email(&self, email: &str) -> UserResult<User> {
        self.repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| UserError::NotFoundByEmail(email.to_string()))
    }

    /// List non-deleted users of the given type
    pub async fn list_by_type(&self, user_type: UserType) -> UserResult<Vec<User>> {
        self.repository.list_by_type(user_type).await
    }

    /// Administrative creation: persist the user with an unconditional first
    /// password history entry, assign roles/permissions, emit `Created`.
    ///
    /// All-or-nothing: a grant failure takes the freshly created row (and
    /// its history entry) back out before the error surfaces.
    pub async fn create_user(&self, input: CreateUser) -> UserResult<User> {
        self.validate_new_user(&input)?;

        let user = self.build_user(&input)?;
        let user = self
            .persist_new_user(user)
            .await
            .map_err(|err| surface(err, CREATE_FAILED))?;

        if let Err(err) = self
            .assign_grants(user.id, &input.roles, &input.permissions)
            .await
        {
            self.discard_user(user.id).await;
            return Err(surface(err, CREATE_FAILED));
        }

        self.events.publish(UserEvent::Created { user_id: user.id });

        if input.send_confirmation_email && !input.email_verified {
            if let Some(email) = user.email.as_deref() {
                self.notify_email_verification(email).await;
            }
        }

        Ok(user)
    }

    /// Self sign-up: same creation path as [`Self::create_user`] but without
    /// role or permission assignment.
    pub async fn register_user(&self, input: CreateUser) -> UserResult<User> {
        self.validate_new_user(&input)?;

        let user = self.build_user(&input)?;
        let user = self
            .persist_new_user(user)
            .await
            .map_err(|err| surface(err, REGISTER_FAILED))?;

        self.events.publish(UserEvent::Created { user_id: user.id });

        Ok(user)
    }

    /// Find-or-create a user from an external provider identity. The account
    /// has no local credential and its email counts as verified.
    pub async fn register_provider(
        &self,
        provider: &str,
        provider_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> UserResult<User> {
        if let Some(existing) = self.repository.find_by_provider(provider, provider_id).await? {
            return Ok(existing);
        }

        let mut user = User::new(UserType::User, name.to_string());
        user.email = email.map(|e| e.to_string());
        user.provider = Some(provider.to_string());
        user.provider_id = Some(provider_id.to_string());
        user.email_verified_at = Some(Utc::now());

        let user = self.persist_new_user(user).await.map_err(|err| {
            surface(
                err,
                &format!("There was a problem connecting to {}", provider),
            )
        })?;

        self.events.publish(UserEvent::Created { user_id: user.id });

        Ok(user)
    }

    /// Administrative update. The master admin's type is immutable and its
    /// role/permission sets are left untouched; everyone else takes the given
    /// type and gets full sync semantics.
    ///
    /// A grant failure puts the previous row back, so a caller retrying
    /// re-syncs from an unchanged account.
    pub async fn update_user(&self, id: Uuid, input: UpdateUser) -> UserResult<User> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let mut user = self.get_user(id).await?;
        self.ensure_not_deleted(&user)?;
        let original = user.clone();

        user.user_type = if user.is_master_admin() {
            UserType::Admin
        } else {
            input.user_type.unwrap_or(user.user_type)
        };
        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(email) = input.email {
            user.email = Some(email);
        }
        user.updated_at = Utc::now();

        let user = self
            .repository
            .save(user)
            .await
            .map_err(|err| surface(err, UPDATE_FAILED))?;

        if !user.is_master_admin() {
            if let Err(err) = self
                .assign_grants(user.id, &input.roles, &input.permissions)
                .await
            {
                self.revert_user(original).await;
                return Err(surface(err, UPDATE_FAILED));
            }
        }

        self.events.publish(UserEvent::Updated { user_id: user.id });

        Ok(user)
    }

    /// A user editing their own profile. An email change is only applied when
    /// the configuration allows it; it resets verification and triggers a
    /// best-effort verification notification.
    pub async fn update_profile(&self, id: Uuid, input: UpdateProfile) -> UserResult<User> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let mut user = self.get_user(id).await?;
        self.ensure_not_deleted(&user)?;

        if let Some(name) = input.name {
            user.name = name;
        }

        let mut email_changed = false;
        if let Some(email) = input.email {
            if self.config.change_email && user.email.as_deref() != Some(email.as_str()) {
                user.email = Some(email);
                user.email_verified_at = None;
                email_changed = true;
            }
        }
        user.updated_at = Utc::now();

        let user = self
            .repository
            .save(user)
            .await
            .map_err(|err| surface(err, UPDATE_FAILED))?;

        if email_changed {
            if let Some(email) = user.email.as_deref() {
                self.notify_email_verification(email).await;
            }
        }

        Ok(user)
    }

    /// Change a user's password.
    ///
    /// A supplied current password must verify against the stored hash. The
    /// reuse check runs before anything is persisted; the history entry is
    /// only appended when the stored hash actually changed.
    pub async fn update_password(
        &self,
        id: Uuid,
        input: ChangePassword,
        expired: bool,
    ) -> UserResult<User> {
        let mut user = self.get_user(id).await?;
        self.ensure_not_deleted(&user)?;

        if let Some(current) = input.current_password.as_deref() {
            let stored = user.password_hash.as_deref().ok_or_else(|| {
                UserError::Authorization("This account has no local password.".to_string())
            })?;

            if !self.hasher.verify(current, stored)? {
                return Err(UserError::Authorization(
                    "That is not your old password.".to_string(),
                ));
            }
        }

        if self
            .policy
            .is_reused(&UserRef::Id(user.id), &input.password)
            .await?
        {
            return Err(UserError::PasswordReuse(self.policy.retention()));
        }

        let original = user.clone();

        // Reset the expiration clock
        if expired {
            user.password_changed_at = Some(Utc::now());
        }

        let new_hash = self.hash_if_needed(&input.password)?;
        let hash_changed = user.password_hash.as_deref() != Some(new_hash.as_str());
        user.password_hash = Some(new_hash);
        user.updated_at = Utc::now();

        let user = self
            .repository
            .save(user)
            .await
            .map_err(|err| surface(err, UPDATE_FAILED))?;

        if hash_changed {
            if let Err(err) = self.log_password_history(&user).await {
                self.revert_user(original).await;
                return Err(surface(err, UPDATE_FAILED));
            }
        }

        Ok(user)
    }

    /// Activate or deactivate a user. Deactivating yourself or the master
    /// admin is rejected.
    pub async fn mark_active(
        &self,
        id: Uuid,
        active: bool,
        acting_user_id: Uuid,
    ) -> UserResult<User> {
        let mut user = self.get_user(id).await?;
        self.ensure_not_deleted(&user)?;

        if !active && acting_user_id == user.id {
            return Err(UserError::Authorization(
                "You can not do that to yourself.".to_string(),
            ));
        }

        if !active && user.is_master_admin() {
            return Err(UserError::Authorization(
                "You can not deactivate the administrator account.".to_string(),
            ));
        }

        user.active = active;
        user.updated_at = Utc::now();

        let user = self
            .repository
            .save(user)
            .await
            .map_err(|err| surface(err, UPDATE_FAILED))?;

        self.events.publish(UserEvent::StatusChanged {
            user_id: user.id,
            active,
        });

        Ok(user)
    }

    /// Soft-delete a user. Deleting yourself is rejected.
    pub async fn delete_user(&self, id: Uuid, acting_user_id: Uuid) -> UserResult<User> {
        let user = self.get_user(id).await?;

        if user.id == acting_user_id {
            return Err(UserError::Authorization(
                "You can not delete yourself.".to_string(),
            ));
        }
        self.ensure_not_deleted(&user)?;

        let user = self
            .repository
            .soft_delete(user.id)
            .await
            .map_err(|err| surface(err, DELETE_FAILED))?;

        self.events.publish(UserEvent::Deleted { user_id: user.id });

        Ok(user)
    }

    /// Bring a soft-deleted user back, otherwise unchanged
    pub async fn restore_user(&self, id: Uuid) -> UserResult<User> {
        let user = self.get_user(id).await?;

        if !user.is_deleted() {
            return Err(UserError::Validation(
                "This user is not deleted.".to_string(),
            ));
        }

        let user = self
            .repository
            .restore(user.id)
            .await
            .map_err(|err| surface(err, RESTORE_FAILED))?;

        self.events.publish(UserEvent::Restored { user_id: user.id });

        Ok(user)
    }

    /// Permanently remove a user and all owned data
    pub async fn destroy_user(&self, id: Uuid) -> UserResult<()> {
        let user = self.get_user(id).await?;

        let removed = self
            .repository
            .hard_delete(user.id)
            .await
            .map_err(|err| surface(err, DESTROY_FAILED))?;
        if !removed {
            return Err(UserError::NotFound(id));
        }

        self.events.publish(UserEvent::Destroyed { user_id: user.id });

        Ok(())
    }

    /// Issue a password reset token and hand it to the notifier. Delivery is
    /// best-effort; a notifier failure is logged, not surfaced.
    pub async fn send_password_reset(&self, email: &str) -> UserResult<String> {
        let user = self.get_user_by_email(email).await?;

        let token = generate_token();
        if let Err(err) = self
            .notifier
            .send_password_reset(
                email,
                &token,
                self.config.password_reset_expiry_minutes,
            )
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "Password reset notification failed");
        }

        Ok(token)
    }

    fn validate_new_user(&self, input: &CreateUser) -> UserResult<()> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let has_credential = input.password.is_some();
        let has_provider = input.provider.is_some() && input.provider_id.is_some();
        if !has_credential && !has_provider {
            return Err(UserError::Validation(
                "Either a password or a provider identity is required.".to_string(),
            ));
        }

        if input.phone_number.is_none() {
            return Err(UserError::Validation(
                "A phone number is required.".to_string(),
            ));
        }

        Ok(())
    }

    fn build_user(&self, input: &CreateUser) -> UserResult<User> {
        let mut user = User::new(input.user_type, input.name.clone());
        user.email = input.email.clone();
        user.phone_number = input.phone_number.clone();
        user.provider = input.provider.clone();
        user.provider_id = input.provider_id.clone();
        user.active = input.active;
        if input.email_verified {
            user.email_verified_at = Some(Utc::now());
        }
        if let Some(password) = input.password.as_deref() {
            user.password_hash = Some(self.hash_if_needed(password)?);
        }

        Ok(user)
    }

    async fn persist_new_user(&self, user: User) -> UserResult<User> {
        let user = self.repository.create(user).await?;
        if let Err(err) = self.log_password_history(&user).await {
            self.discard_user(user.id).await;
            return Err(err);
        }
        Ok(user)
    }

    async fn assign_grants(
        &self,
        user_id: Uuid,
        roles: &[String],
        permissions: &[String],
    ) -> UserResult<()> {
        self.authorization.sync_roles(user_id, roles).await?;

        if !self.config.only_roles {
            self.authorization
                .sync_permissions(user_id, permissions)
                .await?;
        }

        Ok(())
    }

    /// Compensation for a failed multi-write creation: remove the row (and
    /// any owned history) again so no partial account stays visible
    async fn discard_user(&self, id: Uuid) {
        if let Err(err) = self.repository.hard_delete(id).await {
            tracing::error!(user_id = %id, error = %err, "Failed to discard partially created user");
        }
    }

    /// Compensation for a failed multi-write update: put the previous row
    /// back
    async fn revert_user(&self, original: User) {
        let id = original.id;
        if let Err(err) = self.repository.save(original).await {
            tracing::error!(user_id = %id, error = %err, "Failed to revert user after failed update");
        }
    }

    /// Mirror the stored hash into the history log, when the feature is on
    /// and the account has a local credential at all
    async fn log_password_history(&self, user: &User) -> UserResult<()> {
        if !self.config.password_history_enabled() {
            return Ok(());
        }

        if let Some(hash) = user.password_hash.as_deref() {
            self.repository
                .append_history(PasswordHistory::new(user.id, hash.to_string()))
                .await?;
        }

        Ok(())
    }

    fn hash_if_needed(&self, raw: &str) -> UserResult<String> {
        if self.hasher.looks_hashed(raw) {
            Ok(raw.to_string())
        } else {
            self.hasher.hash(raw)
        }
    }

    fn ensure_not_deleted(&self, user: &User) -> UserResult<()> {
        if user.is_deleted() {
            return Err(UserError::Validation(
                "This user has been deleted.".to_string(),
            ));
        }
        Ok(())
    }

    async fn notify_email_verification(&self, email: &str) {
        let token = generate_token();
        if let Err(err) = self.notifier.send_email_verification(email, &token).await {
            tracing::warn!(email = %email, error = %err, "Email verification notification failed");
        }
    }
}

/// Replace an underlying storage failure with a stable, user-safe message;
/// domain errors pass through untouched.
fn surface(err: UserError, message: &str) -> UserError {
    match err {
        UserError::Persistence(detail) => {
            tracing::error!(detail = %detail, "Storage failure");
            UserError::Persistence(message.to_string())
        }
        other => other,
    }
}
