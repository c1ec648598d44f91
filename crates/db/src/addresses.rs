//! Shipping addresses. Each user may keep at most [`MAX_ADDRESSES_PER_USER`].

use sqlx::PgPool;

use dewy_core::{AddressId, UserId};

use crate::RepositoryError;

pub const MAX_ADDRESSES_PER_USER: i64 = 2;

/// A saved shipping address.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Address {
    pub id: AddressId,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering for order summaries.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.extend([self.city.as_str(), self.state.as_str(), self.postal_code.as_str()]);
        parts.join(", ")
    }
}

/// Address form fields.
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl AddressInput {
    /// Check required fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` naming the first empty field.
    pub fn validate(&self) -> Result<(), RepositoryError> {
        let required = [
            ("full name", &self.full_name),
            ("phone", &self.phone),
            ("address line 1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal code", &self.postal_code),
        ];
        if let Some((field, _)) = required.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(RepositoryError::Validation(format!("{field} is required")));
        }
        dewy_core::delivery::normalize_postal_code(&self.postal_code)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;
        Ok(())
    }
}

pub(crate) const ADDRESS_COLUMNS: &str =
    "id, user_id, full_name, phone, line1, line2, city, state, postal_code, is_default";

/// Repository for address operations. Every query is scoped to a user.
pub struct AddressRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Default address first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let rows = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE user_id = $1 \
             ORDER BY is_default DESC, created_at"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(
        &self,
        user_id: UserId,
        id: AddressId,
    ) -> Result<Option<Address>, RepositoryError> {
        let row = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Add an address. The first one becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when the user already has
    /// [`MAX_ADDRESSES_PER_USER`] addresses or a field is missing.
    pub async fn create(
        &self,
        user_id: UserId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        input.validate()?;
        let mut tx = self.pool.begin().await?;

        // Serialise concurrent creates for the same user.
        sqlx::query("SELECT id FROM shop.user_profile WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let existing =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shop.address WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *tx)
                .await?;
        if existing >= MAX_ADDRESSES_PER_USER {
            return Err(RepositoryError::Validation(format!(
                "you can save at most {MAX_ADDRESSES_PER_USER} addresses"
            )));
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            r"
            INSERT INTO shop.address
                (user_id, full_name, phone, line1, line2, city, state, postal_code, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(user_id)
        .bind(input.full_name.trim())
        .bind(input.phone.trim())
        .bind(input.line1.trim())
        .bind(input.line2.as_deref().map(str::trim).filter(|l| !l.is_empty()))
        .bind(input.city.trim())
        .bind(input.state.trim())
        .bind(input.postal_code.trim())
        .bind(existing == 0)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, RepositoryError> {
        input.validate()?;
        sqlx::query_as::<_, Address>(&format!(
            r"
            UPDATE shop.address
            SET full_name = $3, phone = $4, line1 = $5, line2 = $6,
                city = $7, state = $8, postal_code = $9
            WHERE id = $1 AND user_id = $2
            RETURNING {ADDRESS_COLUMNS}
            "
        ))
        .bind(id)
        .bind(user_id)
        .bind(input.full_name.trim())
        .bind(input.phone.trim())
        .bind(input.line1.trim())
        .bind(input.line2.as_deref().map(str::trim).filter(|l| !l.is_empty()))
        .bind(input.city.trim())
        .bind(input.state.trim())
        .bind(input.postal_code.trim())
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an address; if it was the default, the remaining one takes over.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let was_default = sqlx::query_scalar::<_, bool>(
            "DELETE FROM shop.address WHERE id = $1 AND user_id = $2 RETURNING is_default",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_default {
            sqlx::query(
                r"
                UPDATE shop.address SET is_default = TRUE
                WHERE id = (SELECT id FROM shop.address WHERE user_id = $1 ORDER BY created_at LIMIT 1)
                ",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Make `id` the user's default address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not the user's.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE shop.address SET is_default = (id = $1) WHERE user_id = $2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let owned = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM shop.address WHERE id = $1 AND user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if result.rows_affected() == 0 || !owned {
            return Err(RepositoryError::NotFound);
        }
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input() -> AddressInput {
        AddressInput {
            full_name: "Meera Iyer".to_owned(),
            phone: "+91 98450 00000".to_owned(),
            line1: "12 Lake View Road".to_owned(),
            line2: None,
            city: "Bengaluru".to_owned(),
            state: "KA".to_owned(),
            postal_code: "560 034".to_owned(),
        }
    }

    #[test]
    fn validate_accepts_complete_address() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn validate_names_missing_field() {
        let address = AddressInput {
            city: "  ".to_owned(),
            ..input()
        };
        let err = address.validate().unwrap_err();
        assert_eq!(err.to_string(), "city is required");
    }

    #[test]
    fn validate_rejects_bad_postal_code() {
        let address = AddressInput {
            postal_code: "56@034".to_owned(),
            ..input()
        };
        assert!(matches!(address.validate(), Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn one_line_skips_empty_line2() {
        let address = Address {
            id: AddressId::new(1),
            user_id: UserId::new(1),
            full_name: "Meera Iyer".to_owned(),
            phone: "1".to_owned(),
            line1: "12 Lake View Road".to_owned(),
            line2: Some(String::new()),
            city: "Bengaluru".to_owned(),
            state: "KA".to_owned(),
            postal_code: "560034".to_owned(),
            is_default: true,
        };
        assert_eq!(address.one_line(), "12 Lake View Road, Bengaluru, KA, 560034");
    }
}
