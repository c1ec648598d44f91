//! Admin authentication service.
//!
//! Admins are ordinary `user_profile` rows with `role = 'admin'`, so they
//! sign in with the same argon2 password hashes as customers. Accounts are
//! created or promoted with `dewy admin create`.

mod error;

pub use error::AdminAuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::PgPool;
use tracing::instrument;

use dewy_core::{Email, UserRole};
use dewy_db::{UserRepository, users::User};

/// Minimum admin password length. Stricter than the storefront.
const MIN_PASSWORD_LENGTH: usize = 12;

const MAX_PASSWORD_LENGTH: usize = 128;

const MAX_NAME_LENGTH: usize = 100;

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    users: UserRepository<'a>,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new admin authentication service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            users: UserRepository::new(pool),
        }
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError::InvalidCredentials` for a wrong email or
    /// password and `AdminAuthError::NotAdmin` for a customer account.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AdminAuthError> {
        let email = Email::parse(email)?;

        let (user, password_hash) = self
            .users
            .get_password_hash(&email)
            .await?
            .ok_or(AdminAuthError::InvalidCredentials)?;

        verify_password(password, &password_hash)?;

        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, "customer account attempted back-office login");
            return Err(AdminAuthError::NotAdmin);
        }

        Ok(user)
    }

    /// Create an admin account, or promote an existing account and reset
    /// its password. Returns the user and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns `AdminAuthError` for invalid input or a database failure.
    #[instrument(skip(self, password))]
    pub async fn create_or_promote(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<(User, bool), AdminAuthError> {
        let email = Email::parse(email)?;
        validate_name(name)?;
        validate_password(password)?;
        let password_hash = hash_password(password)?;

        if let Some(existing) = self.users.get_by_email(&email).await? {
            self.users.set_role(existing.id, UserRole::Admin).await?;
            self.users
                .set_password_hash(existing.id, &password_hash)
                .await?;
            tracing::info!(user_id = %existing.id, "account promoted to admin");
            let user = User {
                role: UserRole::Admin,
                ..existing
            };
            return Ok((user, false));
        }

        let user = self
            .users
            .create_with_password(&email, name.trim(), &password_hash, UserRole::Admin)
            .await?;
        tracing::info!(user_id = %user.id, "admin account created");
        Ok((user, true))
    }
}

fn validate_name(name: &str) -> Result<(), AdminAuthError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminAuthError::InvalidName("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AdminAuthError::InvalidName(format!(
            "name must be at most {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate password meets requirements.
///
/// # Errors
///
/// Returns `AdminAuthError::WeakPassword` outside the allowed length.
pub fn validate_password(password: &str) -> Result<(), AdminAuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(AdminAuthError::WeakPassword(format!(
            "password must be at most {MAX_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AdminAuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AdminAuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AdminAuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AdminAuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AdminAuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AdminAuthError::InvalidCredentials)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("back-office-2026!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("back-office-2026!", &hash).is_ok());
        assert!(matches!(
            verify_password("back-office-2025!", &hash),
            Err(AdminAuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn admin_passwords_are_longer() {
        assert!(matches!(
            validate_password("eleven-char"),
            Err(AdminAuthError::WeakPassword(_))
        ));
        assert!(validate_password("twelve-chars").is_ok());
        assert!(validate_password(&"p".repeat(MAX_PASSWORD_LENGTH + 1)).is_err());
    }

    #[test]
    fn name_is_required() {
        assert!(matches!(validate_name(""), Err(AdminAuthError::InvalidName(_))));
        assert!(validate_name("Ops Team").is_ok());
    }
}
