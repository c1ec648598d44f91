//! Delivery time mappings.

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};

use dewy_core::delivery::{self, DEFAULT_ESTIMATE, DeliveryEstimate, DeliveryRule};
use dewy_core::DeliveryMappingId;

use crate::RepositoryError;

/// A stored mapping row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveryMapping {
    pub id: DeliveryMappingId,
    pub pattern: String,
    pub min_days: i32,
    pub max_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Active rules, for estimating inside any executor (pool or transaction).
pub(crate) async fn active_rules<'e, E>(executor: E) -> Result<Vec<DeliveryRule>, RepositoryError>
where
    E: Executor<'e, Database = Postgres>,
{
    let rows = sqlx::query_as::<_, (String, i32, i32)>(
        "SELECT pattern, min_days, max_days FROM shop.delivery_time_mapping WHERE is_active",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(pattern, min_days, max_days)| DeliveryRule {
            pattern,
            min_days,
            max_days,
        })
        .collect())
}

/// Repository for delivery mappings.
pub struct DeliveryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DeliveryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<DeliveryMapping>, RepositoryError> {
        let rows = sqlx::query_as::<_, DeliveryMapping>(
            "SELECT id, pattern, min_days, max_days, is_active, created_at \
             FROM shop.delivery_time_mapping ORDER BY length(pattern) DESC, pattern",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Active rules, as used by [`Self::estimate`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_active(&self) -> Result<Vec<DeliveryRule>, RepositoryError> {
        active_rules(self.pool).await
    }

    /// Estimate the delivery window for a postal code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for a malformed postal code.
    pub async fn estimate(&self, postal_code: &str) -> Result<DeliveryEstimate, RepositoryError> {
        let rules = active_rules(self.pool).await?;
        delivery::estimate(postal_code, &rules, DEFAULT_ESTIMATE)
            .map_err(|e| RepositoryError::Validation(e.to_string()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for malformed input, `Conflict`
    /// for a duplicate pattern.
    pub async fn create(
        &self,
        pattern: &str,
        min_days: i32,
        max_days: i32,
        is_active: bool,
    ) -> Result<DeliveryMapping, RepositoryError> {
        let rule = DeliveryRule::new(pattern, min_days, max_days)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        let row = sqlx::query_as::<_, DeliveryMapping>(
            r"
            INSERT INTO shop.delivery_time_mapping (pattern, min_days, max_days, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id, pattern, min_days, max_days, is_active, created_at
            ",
        )
        .bind(&rule.pattern)
        .bind(rule.min_days)
        .bind(rule.max_days)
        .bind(is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "pattern already exists"))?;
        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `Validation` or `Conflict`.
    pub async fn update(
        &self,
        id: DeliveryMappingId,
        pattern: &str,
        min_days: i32,
        max_days: i32,
        is_active: bool,
    ) -> Result<DeliveryMapping, RepositoryError> {
        let rule = DeliveryRule::new(pattern, min_days, max_days)
            .map_err(|e| RepositoryError::Validation(e.to_string()))?;

        sqlx::query_as::<_, DeliveryMapping>(
            r"
            UPDATE shop.delivery_time_mapping
            SET pattern = $2, min_days = $3, max_days = $4, is_active = $5
            WHERE id = $1
            RETURNING id, pattern, min_days, max_days, is_active, created_at
            ",
        )
        .bind(id)
        .bind(&rule.pattern)
        .bind(rule.min_days)
        .bind(rule.max_days)
        .bind(is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "pattern already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the mapping does not exist.
    pub async fn delete(&self, id: DeliveryMappingId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.delivery_time_mapping WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
