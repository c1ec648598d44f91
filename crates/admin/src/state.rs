//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use dewy_mail::{MailError, Mailer};

use crate::config::AdminConfig;
use crate::storage::{ObjectStorage, StorageError};

/// Error building application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("mailer: {0}")]
    Mail(#[from] MailError),
    #[error("object storage: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    mailer: Mailer,
    storage: Option<ObjectStorage>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the mail transport or storage client cannot be built.
    pub fn new(config: AdminConfig, pool: PgPool) -> Result<Self, StateError> {
        let mailer = Mailer::new(&config.mail)?;
        let storage = config
            .storage
            .clone()
            .map(ObjectStorage::new)
            .transpose()?;
        Ok(Self::with_parts(config, pool, mailer, storage))
    }

    /// Assemble state from prebuilt parts.
    #[must_use]
    pub fn with_parts(
        config: AdminConfig,
        pool: PgPool,
        mailer: Mailer,
        storage: Option<ObjectStorage>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                mailer,
                storage,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
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

    /// Image storage, if configured.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotConfigured` when the storage variables are unset.
    pub fn storage(&self) -> Result<&ObjectStorage, StorageError> {
        self.inner
            .storage
            .as_ref()
            .ok_or(StorageError::NotConfigured)
    }
}
