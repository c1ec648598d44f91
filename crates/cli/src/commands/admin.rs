//! Back-office account management.
//!
//! ```bash
//! dewy admin create -e ops@dewy.shop -n "Ops Team" -p 'a-long-password'
//! ```
//!
//! Creating an admin for an email that already has a customer account
//! promotes that account and resets its password.

use thiserror::Error;

use dewy_admin::services::auth::{AdminAuthError, AdminAuthService};

use super::ConnectError;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Auth(#[from] AdminAuthError),
}

/// Create or promote an admin account.
///
/// # Errors
///
/// Returns an error for invalid input or a database failure.
pub async fn create(email: &str, name: &str, password: &str) -> Result<(), AdminError> {
    let pool = super::connect().await?;

    let (user, created) = AdminAuthService::new(&pool)
        .create_or_promote(email, name, password)
        .await?;

    if created {
        tracing::info!(user_id = %user.id, email = %user.email, "Admin account created");
    } else {
        tracing::info!(user_id = %user.id, email = %user.email, "Existing account promoted to admin");
    }
    Ok(())
}
