//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use dewy_mail::{MailError, Mailer};

use crate::config::StorefrontConfig;
use crate::services::chat::{ChatClient, ChatError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("mailer: {0}")]
    Mail(#[from] MailError),
    #[error("chat client: {0}")]
    Chat(#[from] ChatError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    mailer: Mailer,
    chat: ChatClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the mail transport or HTTP client cannot be built.
    pub fn new(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let mailer = Mailer::new(&config.mail)?;
        let chat = ChatClient::new(&config.chat)?;
        Ok(Self::with_parts(config, pool, mailer, chat))
    }

    /// Assemble state from prebuilt parts (tests swap in a disabled mailer).
    #[must_use]
    pub fn with_parts(
        config: StorefrontConfig,
        pool: PgPool,
        mailer: Mailer,
        chat: ChatClient,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                mailer,
                chat,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn mailer(&self) -> &Mailer {
        &self.inner.mailer
    }

    #[must_use]
    pub fn chat(&self) -> &ChatClient {
        &self.inner.chat
    }
}
