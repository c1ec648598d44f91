//! Email configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! - `EMAIL_PROVIDER` - `smtp`, `resend` or `sendgrid`. Unset disables email.
//! - `EMAIL_FROM` - Sender address (required when a provider is set)
//! - `ADMIN_NOTIFICATION_EMAIL` - Where new-order alerts go (optional)
//!
//! ## SMTP
//! - `SMTP_HOST`, `SMTP_USERNAME`, `SMTP_PASSWORD` - required
//! - `SMTP_PORT` - default 587
//!
//! ## Resend / SendGrid
//! - `RESEND_API_KEY` / `SENDGRID_API_KEY`

use secrecy::SecretString;
use thiserror::Error;

/// Resend send endpoint.
pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// SendGrid v3 send endpoint.
pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Which service delivers mail.
///
/// Implements `Debug` manually to redact credentials.
#[derive(Clone)]
pub enum ProviderConfig {
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: SecretString,
    },
    Resend {
        api_key: SecretString,
        endpoint: String,
    },
    SendGrid {
        api_key: SecretString,
        endpoint: String,
    },
    /// Sends are logged and skipped.
    Disabled,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Smtp {
                host,
                port,
                username,
                ..
            } => f
                .debug_struct("Smtp")
                .field("host", host)
                .field("port", port)
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Resend { endpoint, .. } => f
                .debug_struct("Resend")
                .field("api_key", &"[REDACTED]")
                .field("endpoint", endpoint)
                .finish(),
            Self::SendGrid { endpoint, .. } => f
                .debug_struct("SendGrid")
                .field("api_key", &"[REDACTED]")
                .field("endpoint", endpoint)
                .finish(),
            Self::Disabled => f.write_str("Disabled"),
        }
    }
}

/// Everything the [`Mailer`](crate::Mailer) needs.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub provider: ProviderConfig,
    /// From header, e.g. `Dewy <hello@dewy.shop>`.
    pub from_address: String,
    /// Recipient of new-order alerts.
    pub admin_notification: Option<String>,
}

impl MailConfig {
    /// A configuration that sends nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            provider: ProviderConfig::Disabled,
            from_address: "Dewy <hello@dewy.shop>".to_string(),
            admin_notification: None,
        }
    }

    /// Load from the environment.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an unknown provider or a missing variable
    /// the chosen provider needs.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let Some(provider) = get_optional_env("EMAIL_PROVIDER") else {
            return Ok(Self {
                admin_notification: get_optional_env("ADMIN_NOTIFICATION_EMAIL"),
                ..Self::disabled()
            });
        };

        let provider = match provider.to_lowercase().as_str() {
            "smtp" => {
                let port = get_env_or_default("SMTP_PORT", "587")
                    .parse::<u16>()
                    .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;
                ProviderConfig::Smtp {
                    host: get_required_env("SMTP_HOST")?,
                    port,
                    username: get_required_env("SMTP_USERNAME")?,
                    password: SecretString::from(get_required_env("SMTP_PASSWORD")?),
                }
            }
            "resend" => ProviderConfig::Resend {
                api_key: SecretString::from(get_required_env("RESEND_API_KEY")?),
                endpoint: RESEND_ENDPOINT.to_string(),
            },
            "sendgrid" => ProviderConfig::SendGrid {
                api_key: SecretString::from(get_required_env("SENDGRID_API_KEY")?),
                endpoint: SENDGRID_ENDPOINT.to_string(),
            },
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "EMAIL_PROVIDER".to_string(),
                    format!("unknown provider '{other}' (expected smtp, resend or sendgrid)"),
                ));
            }
        };

        Ok(Self {
            provider,
            from_address: get_required_env("EMAIL_FROM")?,
            admin_notification: get_optional_env("ADMIN_NOTIFICATION_EMAIL"),
        })
    }
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    get_optional_env(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_credentials() {
        let provider = ProviderConfig::Resend {
            api_key: SecretString::from("re_live_abc123"),
            endpoint: RESEND_ENDPOINT.to_string(),
        };
        let debug = format!("{provider:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("re_live_abc123"));

        let smtp = ProviderConfig::Smtp {
            host: "smtp.example.net".to_string(),
            port: 587,
            username: "mailer".to_string(),
            password: SecretString::from("hunter2hunter2"),
        };
        assert!(!format!("{smtp:?}").contains("hunter2"));
    }

    #[test]
    fn disabled_has_no_admin_recipient() {
        let config = MailConfig::disabled();
        assert!(matches!(config.provider, ProviderConfig::Disabled));
        assert!(config.admin_notification.is_none());
    }
}
