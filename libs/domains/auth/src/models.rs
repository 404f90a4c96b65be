use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// The one distinguished account that can never be deactivated, deleted or
/// have its type changed.
pub const MASTER_ADMIN_ID: Uuid = Uuid::from_u128(1);

/// Role names assignable to admin-type users. The actual role/permission
/// storage lives behind [`crate::authorization::AuthorizationGateway`];
/// these are just the well-known names.
pub const ROLE_BROKER: &str = "broker";
pub const ROLE_COORDINATOR: &str = "coordinator";
pub const ROLE_EXPERT: &str = "expert";
pub const ROLE_LEADERSHIP: &str = "leadership";

/// User account types (closed set)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Admin,
    #[default]
    User,
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserType::Admin => write!(f, "admin"),
            UserType::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for UserType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserType::Admin),
            "user" => Ok(UserType::User),
            _ => Err(format!("Unknown user type: {}", s)),
        }
    }
}

/// User entity
///
/// Exactly one of the local credential (`password_hash`) or the external
/// provider identity (`provider` + `provider_id`) is authoritative for login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub user_type: UserType,
    pub name: String,
    /// Unique among non-deleted users
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Argon2 hash, never a plaintext (never exposed in serialized output)
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    /// Refreshed on expiry-driven password resets
    pub password_changed_at: Option<DateTime<Utc>>,
    /// External provider name (e.g. "google"), paired with `provider_id`
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    /// Soft-delete marker; the row survives for a possible restore
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_type: UserType, name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            user_type,
            name,
            email: None,
            phone_number: None,
            password_hash: None,
            active: true,
            email_verified_at: None,
            password_changed_at: None,
            provider: None,
            provider_id: None,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_master_admin(&self) -> bool {
        self.id == MASTER_ADMIN_ID
    }

    pub fn is_admin(&self) -> bool {
        self.user_type == UserType::Admin
    }

    pub fn is_user(&self) -> bool {
        self.user_type == UserType::User
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Whether login goes through an external provider instead of a local
    /// credential.
    pub fn is_social(&self) -> bool {
        self.provider.is_some() && self.provider_id.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Password history entry: immutable once created, owned by its user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl PasswordHistory {
    pub fn new(user_id: Uuid, password_hash: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

fn default_active() -> bool {
    true
}

/// DTO for administrative user creation and self registration
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUser {
    pub user_type: UserType,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    /// Plaintext or an already-hashed PHC string; hashed at the service layer
    pub password: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub phone_number: Option<String>,
    pub provider: Option<String>,
    pub provider_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub email_verified: bool,
    /// Ask for a verification mail when the email is not pre-verified
    #[serde(default)]
    pub send_confirmation_email: bool,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl CreateUser {
    pub fn new(user_type: UserType, name: impl Into<String>) -> Self {
        Self {
            user_type,
            name: name.into(),
            email: None,
            password: None,
            phone_number: None,
            provider: None,
            provider_id: None,
            active: true,
            email_verified: false,
            send_confirmation_email: false,
            roles: Vec::new(),
            permissions: Vec::new(),
        }
    }
}

/// DTO for administrative user updates; role/permission sets are replaced
/// wholesale (sync semantics)
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUser {
    pub user_type: Option<UserType>,
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// DTO for a user editing their own profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
}

/// DTO for a password change
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePassword {
    /// When present, must verify against the stored hash (re-authentication)
    pub current_password: Option<String>,
    pub password: String,
}
