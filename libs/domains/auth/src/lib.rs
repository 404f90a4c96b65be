//! User account and credential lifecycle domain.
//!
//! The [`service::UserService`] is the single entry point for every account
//! state transition; persistence, password hashing, role/permission storage,
//! outbound mail and event delivery all sit behind trait seams so the domain
//! logic stays independent of any concrete backend.
//!
//! ```text
//! UserService
//!   ├── UserRepository        (user rows + password history log)
//!   ├── CredentialHasher      (argon2)
//!   ├── AuthorizationGateway  (role / permission sets)
//!   ├── EventSink             (post-commit lifecycle events)
//!   ├── UserNotifier          (best-effort outbound mail)
//!   └── PasswordHistoryPolicy (reuse check over the last N hashes)
//! ```

pub mod authorization;
pub mod config;
pub mod error;
pub mod events;
pub mod hasher;
pub mod models;
pub mod notifier;
pub mod password_history;
pub mod repository;
pub mod service;

pub use authorization::{AuthorizationGateway, InMemoryAuthorizationGateway};
pub use config::AccessConfig;
pub use error::{UserError, UserResult};
pub use events::{EventSink, NullEventSink, UserEvent};
pub use hasher::{Argon2Hasher, CredentialHasher};
pub use models::{
    ChangePassword, CreateUser, MASTER_ADMIN_ID, PasswordHistory, UpdateProfile, UpdateUser, User,
    UserType,
};
pub use notifier::{LogOnlyNotifier, UserNotifier, generate_token};
pub use password_history::{PasswordHistoryPolicy, UserRef};
pub use repository::{InMemoryUserRepository, UserRepository};
pub use service::UserService;
