use core_config::{ConfigError, FromEnv, env_parse_or};

/// Access-control options for the user domain, passed into
/// [`crate::service::UserService`] at construction.
#[derive(Debug, Clone)]
pub struct AccessConfig {
    /// How many previous passwords a user may not reuse; 0 disables both the
    /// reuse check and history logging.
    pub password_history: usize,
    /// When set, administrative updates only sync roles and leave the
    /// per-user permission set alone.
    pub only_roles: bool,
    /// Whether users may change their own email address.
    pub change_email: bool,
    /// Lifetime of a password reset link, in minutes.
    pub password_reset_expiry_minutes: u32,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            password_history: 3,
            only_roles: false,
            change_email: true,
            password_reset_expiry_minutes: 60,
        }
    }
}

impl FromEnv for AccessConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = AccessConfig::default();

        Ok(Self {
            password_history: env_parse_or("PASSWORD_HISTORY_COUNT", defaults.password_history)?,
            only_roles: env_parse_or("ONLY_ROLES", defaults.only_roles)?,
            change_email: env_parse_or("CHANGE_EMAIL", defaults.change_email)?,
            password_reset_expiry_minutes: env_parse_or(
                "PASSWORD_RESET_EXPIRY_MINUTES",
                defaults.password_reset_expiry_minutes,
            )?,
        })
    }
}

impl AccessConfig {
    pub fn password_history_enabled(&self) -> bool {
        self.password_history > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AccessConfig::default();
        assert_eq!(config.password_history, 3);
        assert!(config.password_history_enabled());
        assert!(!config.only_roles);
        assert!(config.change_email);
        assert_eq!(config.password_reset_expiry_minutes, 60);
    }

    #[test]
    fn test_from_env_overrides() {
        temp_env::with_vars(
            [
                ("PASSWORD_HISTORY_COUNT", Some("5")),
                ("ONLY_ROLES", Some("true")),
                ("CHANGE_EMAIL", Some("false")),
                ("PASSWORD_RESET_EXPIRY_MINUTES", Some("15")),
            ],
            || {
                let config = AccessConfig::from_env().unwrap();
                assert_eq!(config.password_history, 5);
                assert!(config.only_roles);
                assert!(!config.change_email);
                assert_eq!(config.password_reset_expiry_minutes, 15);
            },
        );
    }

    #[test]
    fn test_zero_disables_history() {
        temp_env::with_var("PASSWORD_HISTORY_COUNT", Some("0"), || {
            let config = AccessConfig::from_env().unwrap();
            assert!(!config.password_history_enabled());
        });
    }

    #[test]
    fn test_invalid_value_errors() {
        temp_env::with_var("PASSWORD_HISTORY_COUNT", Some("lots"), || {
            assert!(AccessConfig::from_env().is_err());
        });
    }
}
