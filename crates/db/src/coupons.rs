//! Coupon repository.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use dewy_core::coupon::{self, CouponRejection, CouponRules};
use dewy_core::{CouponId, Money};

use crate::RepositoryError;

/// A discount code.
#[derive(Debug, Clone)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub rules: CouponRules,
    pub created_at: DateTime<Utc>,
}

/// Admin form fields for a coupon.
#[derive(Debug, Clone)]
pub struct CouponInput {
    pub code: String,
    pub description: Option<String>,
    pub discount_percent: i32,
    pub max_discount_amount: Option<Money>,
    pub min_order_amount: Money,
    pub usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponInput {
    /// Normalise the code and check the ranges the form cannot enforce.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` with a message for the admin.
    pub fn validated(&self) -> Result<(String, CouponRules), RepositoryError> {
        let invalid = |e: coupon::CouponFieldError| RepositoryError::Validation(e.to_string());
        let code = coupon::normalize_code(&self.code).map_err(invalid)?;
        let discount_percent = coupon::validate_percent(self.discount_percent).map_err(invalid)?;
        if self.usage_limit.is_some_and(|limit| limit < 1) {
            return Err(RepositoryError::Validation(
                "usage limit must be at least 1".to_owned(),
            ));
        }
        if self.max_discount_amount.is_some_and(Money::is_zero) {
            return Err(RepositoryError::Validation(
                "maximum discount must be greater than zero".to_owned(),
            ));
        }
        let rules = CouponRules {
            discount_percent,
            max_discount_amount: self.max_discount_amount,
            min_order_amount: self.min_order_amount,
            usage_limit: self.usage_limit,
            used_count: 0,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
        };
        rules.check_window().map_err(invalid)?;
        Ok((code, rules))
    }
}

/// Outcome of checking a code against a cart.
#[derive(Debug, Clone)]
pub enum CouponCheck {
    Applied { coupon: Coupon, discount: Money },
    Rejected(CouponRejection),
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    description: Option<String>,
    discount_percent: i32,
    max_discount_amount: Option<Money>,
    min_order_amount: Money,
    usage_limit: Option<i32>,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        let discount_percent = coupon::validate_percent(row.discount_percent).map_err(|e| {
            RepositoryError::DataCorruption(format!("coupon {}: {e}", row.code))
        })?;

        Ok(Self {
            id: CouponId::new(row.id),
            code: row.code,
            description: row.description,
            rules: CouponRules {
                discount_percent,
                max_discount_amount: row.max_discount_amount,
                min_order_amount: row.min_order_amount,
                usage_limit: row.usage_limit,
                used_count: row.used_count,
                valid_from: row.valid_from,
                valid_until: row.valid_until,
                is_active: row.is_active,
            },
            created_at: row.created_at,
        })
    }
}

const COUPON_COLUMNS: &str = "id, code, description, discount_percent, max_discount_amount, \
     min_order_amount, usage_limit, used_count, valid_from, valid_until, is_active, created_at";

/// Look up a coupon by code inside an open transaction, locking the row.
pub(crate) async fn lock_by_code(
    conn: &mut PgConnection,
    code: &str,
) -> Result<Option<Coupon>, RepositoryError> {
    let row = sqlx::query_as::<_, CouponRow>(&format!(
        "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE code = $1 FOR UPDATE"
    ))
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(TryInto::try_into).transpose()
}

/// Repository for coupon operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Look up a code as typed by a customer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, raw_code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let Ok(code) = coupon::normalize_code(raw_code) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM shop.coupon WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Evaluate a code against a subtotal without consuming it.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the lookup fails. Business
    /// rejections come back as [`CouponCheck::Rejected`].
    pub async fn check(
        &self,
        raw_code: &str,
        subtotal: Money,
        now: DateTime<Utc>,
    ) -> Result<CouponCheck, RepositoryError> {
        let Some(coupon) = self.get_by_code(raw_code).await? else {
            return Ok(CouponCheck::Rejected(CouponRejection::NotFound));
        };
        Ok(match coupon.rules.evaluate(subtotal, now) {
            Ok(discount) => CouponCheck::Applied { coupon, discount },
            Err(rejection) => CouponCheck::Rejected(rejection),
        })
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` for bad input, `Conflict` for a duplicate code.
    pub async fn create(&self, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let (code, rules) = input.validated()?;
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO shop.coupon
                (code, description, discount_percent, max_discount_amount, min_order_amount,
                 usage_limit, valid_from, valid_until, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&code)
        .bind(input.description.as_deref())
        .bind(i32::from(rules.discount_percent))
        .bind(rules.max_discount_amount)
        .bind(rules.min_order_amount)
        .bind(rules.usage_limit)
        .bind(rules.valid_from)
        .bind(rules.valid_until)
        .bind(rules.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "coupon code already exists"))?;

        tracing::info!(code = %code, "coupon created");
        row.try_into()
    }

    /// Update a coupon. The usage counter is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound`, `Validation` or `Conflict`.
    pub async fn update(&self, id: CouponId, input: &CouponInput) -> Result<Coupon, RepositoryError> {
        let (code, rules) = input.validated()?;
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            UPDATE shop.coupon
            SET code = $2, description = $3, discount_percent = $4, max_discount_amount = $5,
                min_order_amount = $6, usage_limit = $7, valid_from = $8, valid_until = $9,
                is_active = $10
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(&code)
        .bind(input.description.as_deref())
        .bind(i32::from(rules.discount_percent))
        .bind(rules.max_discount_amount)
        .bind(rules.min_order_amount)
        .bind(rules.usage_limit)
        .bind(rules.valid_from)
        .bind(rules.valid_until)
        .bind(rules.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "coupon code already exists"))?
        .ok_or(RepositoryError::NotFound)?;

        row.try_into()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn set_active(&self, id: CouponId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop.coupon SET is_active = $2 WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Orders keep the code as text, so deleting a used coupon is allowed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.coupon WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input() -> CouponInput {
        let now = Utc::now();
        CouponInput {
            code: " glow15 ".to_owned(),
            description: Some("Launch offer".to_owned()),
            discount_percent: 15,
            max_discount_amount: Some(Money::from_cents(30_000)),
            min_order_amount: Money::from_cents(99_900),
            usage_limit: Some(500),
            valid_from: now,
            valid_until: Some(now + Duration::days(30)),
            is_active: true,
        }
    }

    #[test]
    fn validated_normalises_code() {
        let (code, rules) = input().validated().unwrap();
        assert_eq!(code, "GLOW15");
        assert_eq!(rules.discount_percent, 15);
        assert_eq!(rules.used_count, 0);
    }

    #[test]
    fn validated_rejects_out_of_range_percent() {
        let coupon = CouponInput {
            discount_percent: 0,
            ..input()
        };
        assert!(matches!(coupon.validated(), Err(RepositoryError::Validation(_))));
        let coupon = CouponInput {
            discount_percent: 120,
            ..input()
        };
        assert!(matches!(coupon.validated(), Err(RepositoryError::Validation(_))));
    }

    #[test]
    fn validated_rejects_inverted_window_and_zero_limits() {
        let now = Utc::now();
        let coupon = CouponInput {
            valid_from: now,
            valid_until: Some(now - Duration::hours(1)),
            ..input()
        };
        assert!(coupon.validated().is_err());

        let coupon = CouponInput {
            usage_limit: Some(0),
            ..input()
        };
        assert!(coupon.validated().is_err());

        let coupon = CouponInput {
            max_discount_amount: Some(Money::ZERO),
            ..input()
        };
        assert!(coupon.validated().is_err());
    }
}
