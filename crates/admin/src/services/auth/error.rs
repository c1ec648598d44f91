//! Admin authentication error types.

use thiserror::Error;

use dewy_db::RepositoryError;

/// Errors that can occur during admin authentication.
#[derive(Debug, Error)]
pub enum AdminAuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] dewy_core::EmailError),

    /// Wrong password or unknown email.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Credentials are right but the account is a customer.
    #[error("account does not have back-office access")]
    NotAdmin,

    /// Password too short or too long.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// Name missing or too long.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
