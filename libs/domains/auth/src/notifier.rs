use async_trait::async_trait;
use tracing::info;

use crate::error::UserResult;

/// Outbound notification channel, consumed as an external collaborator.
///
/// Delivery is asynchronous best-effort: the service logs a failure and moves
/// on, and retry/backoff is the implementation's own responsibility.
#[async_trait]
pub trait UserNotifier: Send + Sync {
    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
        expires_in_minutes: u32,
    ) -> UserResult<()>;

    async fn send_email_verification(&self, email: &str, token: &str) -> UserResult<()>;
}

/// Notifier that only logs, for development and tests without a mail pipeline
#[derive(Debug, Default, Clone)]
pub struct LogOnlyNotifier;

#[async_trait]
impl UserNotifier for LogOnlyNotifier {
    async fn send_password_reset(
        &self,
        email: &str,
        token: &str,
        expires_in_minutes: u32,
    ) -> UserResult<()> {
        info!(
            email = %email,
            token = %token,
            expires_in_minutes = expires_in_minutes,
            "Password reset requested"
        );
        Ok(())
    }

    async fn send_email_verification(&self, email: &str, token: &str) -> UserResult<()> {
        info!(email = %email, token = %token, "Email verification requested");
        Ok(())
    }
}

/// Generate a secure random token (64 alphanumeric characters).
pub fn generate_token() -> String {
    use std::iter;
    let mut rng = rand::rng();
    iter::repeat_with(|| {
        let idx = rand::Rng::random_range(&mut rng, 0..62);
        match idx {
            0..=9 => (b'0' + idx) as char,
            10..=35 => (b'a' + idx - 10) as char,
            _ => (b'A' + idx - 36) as char,
        }
    })
    .take(64)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }

    #[tokio::test]
    async fn test_log_only_notifier_succeeds() {
        let notifier = LogOnlyNotifier;
        notifier
            .send_password_reset("test@example.com", "token", 60)
            .await
            .unwrap();
        notifier
            .send_email_verification("test@example.com", "token")
            .await
            .unwrap();
    }
}
