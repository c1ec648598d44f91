//! Database migration command.
//!
//! ```bash
//! dewy migrate
//! ```
//!
//! Migrations are embedded from the workspace `migrations/` directory, so
//! the binary can run them without the source tree.

use thiserror::Error;

use super::ConnectError;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is unset or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = super::connect().await?;

    tracing::info!("Running migrations...");
    dewy_db::run_migrations(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
