use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{UserError, UserResult};

/// One-way credential hashing.
///
/// `looks_hashed` lets callers recognize a value that is already a hash so a
/// credential accidentally passed in hashed form is not hashed twice.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> UserResult<String>;
    fn verify(&self, plaintext: &str, hash: &str) -> UserResult<bool>;
    fn looks_hashed(&self, value: &str) -> bool;
}

/// Argon2 implementation of [`CredentialHasher`]
#[derive(Debug, Default, Clone)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);

        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> UserResult<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok())
    }

    fn looks_hashed(&self, value: &str) -> bool {
        // Any well-formed PHC string counts, not just our own output
        PasswordHash::new(value).is_ok()
    }
}
