use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("User not found: {0}")]
    NotFound(Uuid),

    #[error("User with email '{0}' not found")]
    NotFoundByEmail(String),

    #[error("User with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not allowed: {0}")]
    Authorization(String),

    #[error("You can not set a password that you have used within your last {0} passwords")]
    PasswordReuse(usize),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Storage error: {0}")]
    Persistence(String),
}

pub type UserResult<T> = Result<T, UserError>;

impl UserError {
    /// Stable machine-readable code, useful for audit log consumers.
    pub fn error_code(&self) -> &'static str {
        match self {
            UserError::NotFound(_) | UserError::NotFoundByEmail(_) => "not_found",
            UserError::DuplicateEmail(_) => "duplicate_email",
            UserError::Validation(_) => "validation_error",
            UserError::Authorization(_) => "not_allowed",
            UserError::PasswordReuse(_) => "password_reuse",
            UserError::PasswordHash(_) => "internal_error",
            UserError::Persistence(_) => "storage_error",
        }
    }
}
