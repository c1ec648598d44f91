//! Coupon rules.
//!
//! The same evaluation runs for the cart-page preview and again inside the
//! order transaction, so a coupon that expires between the two is still
//! refused at checkout.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Money;

/// Maximum length of a coupon code.
pub const MAX_CODE_LENGTH: usize = 32;

/// Why a coupon cannot be applied. The `Display` text is shown to customers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Coupon code not found")]
    NotFound,
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon is not valid yet")]
    NotYetValid,
    #[error("This coupon has expired")]
    Expired,
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
    #[error("Add {shortfall} more to use this coupon (minimum order {minimum})")]
    BelowMinimumOrder { minimum: Money, shortfall: Money },
}

/// Problems with coupon fields entered in the back office.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponFieldError {
    #[error("coupon code cannot be empty")]
    EmptyCode,
    #[error("coupon code must be at most 32 characters")]
    CodeTooLong,
    #[error("coupon code may only contain letters, digits, '-' and '_'")]
    InvalidCharacters,
    #[error("discount percent must be between 1 and 100, got {0}")]
    PercentOutOfRange(i32),
    #[error("valid until must be after valid from")]
    InvertedWindow,
}

/// Normalise a code as typed by a customer or admin.
///
/// # Errors
///
/// Returns [`CouponFieldError`] for empty, over-long or non-alphanumeric codes.
pub fn normalize_code(raw: &str) -> Result<String, CouponFieldError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(CouponFieldError::EmptyCode);
    }
    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(CouponFieldError::CodeTooLong);
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(CouponFieldError::InvalidCharacters);
    }
    Ok(code)
}

/// Check a discount percentage and narrow it to `u8`.
///
/// # Errors
///
/// Returns [`CouponFieldError::PercentOutOfRange`] outside `1..=100`.
pub fn validate_percent(percent: i32) -> Result<u8, CouponFieldError> {
    u8::try_from(percent)
        .ok()
        .filter(|p| (1..=100).contains(p))
        .ok_or(CouponFieldError::PercentOutOfRange(percent))
}

/// The parts of a coupon that decide whether it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRules {
    pub discount_percent: u8,
    pub max_discount_amount: Option<Money>,
    pub min_order_amount: Money,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl CouponRules {
    /// Check the validity window on its own.
    ///
    /// # Errors
    ///
    /// Returns [`CouponFieldError::InvertedWindow`] if `valid_until` is not
    /// after `valid_from`.
    pub fn check_window(&self) -> Result<(), CouponFieldError> {
        match self.valid_until {
            Some(until) if until <= self.valid_from => Err(CouponFieldError::InvertedWindow),
            _ => Ok(()),
        }
    }

    /// Discount this coupon grants on `subtotal` at `now`.
    ///
    /// Checks run in a fixed order (active, window, usage, minimum) so the
    /// customer sees the most fundamental problem first. The discount is
    /// capped by `max_discount_amount` and never exceeds the subtotal.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn evaluate(&self, subtotal: Money, now: DateTime<Utc>) -> Result<Money, CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if now < self.valid_from {
            return Err(CouponRejection::NotYetValid);
        }
        if self.valid_until.is_some_and(|until| until < now) {
            return Err(CouponRejection::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.used_count >= limit) {
            return Err(CouponRejection::UsageLimitReached);
        }
        if subtotal < self.min_order_amount {
            return Err(CouponRejection::BelowMinimumOrder {
                minimum: self.min_order_amount,
                shortfall: self.min_order_amount.saturating_sub(subtotal),
            });
        }

        let mut discount = subtotal.percent(self.discount_percent);
        if let Some(cap) = self.max_discount_amount
            && discount > cap
        {
            discount = cap;
        }
        Ok(discount.min(subtotal))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn rules(now: DateTime<Utc>) -> CouponRules {
        CouponRules {
            discount_percent: 20,
            max_discount_amount: None,
            min_order_amount: Money::ZERO,
            usage_limit: None,
            used_count: 0,
            valid_from: now - Duration::days(1),
            valid_until: Some(now + Duration::days(30)),
            is_active: true,
        }
    }

    #[test]
    fn test_percentage_discount() {
        let now = Utc::now();
        let discount = rules(now).evaluate(Money::from_cents(50_000), now).unwrap();
        assert_eq!(discount, Money::from_cents(10_000));
    }

    #[test]
    fn test_discount_is_capped() {
        let now = Utc::now();
        let coupon = CouponRules {
            max_discount_amount: Some(Money::from_cents(5_000)),
            ..rules(now)
        };
        assert_eq!(
            coupon.evaluate(Money::from_cents(50_000), now).unwrap(),
            Money::from_cents(5_000)
        );
    }

    #[test]
    fn test_full_discount_never_exceeds_subtotal() {
        let now = Utc::now();
        let coupon = CouponRules {
            discount_percent: 100,
            ..rules(now)
        };
        let subtotal = Money::from_cents(1_999);
        assert_eq!(coupon.evaluate(subtotal, now).unwrap(), subtotal);
    }

    #[test]
    fn test_expired_coupon_rejected() {
        let now = Utc::now();
        let coupon = CouponRules {
            valid_from: now - Duration::days(10),
            valid_until: Some(now - Duration::seconds(1)),
            ..rules(now)
        };
        assert_eq!(
            coupon.evaluate(Money::from_cents(10_000), now),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn test_not_yet_valid() {
        let now = Utc::now();
        let coupon = CouponRules {
            valid_from: now + Duration::hours(2),
            ..rules(now)
        };
        assert_eq!(
            coupon.evaluate(Money::from_cents(10_000), now),
            Err(CouponRejection::NotYetValid)
        );
    }

    #[test]
    fn test_open_ended_coupon_never_expires() {
        let now = Utc::now();
        let coupon = CouponRules {
            valid_until: None,
            ..rules(now)
        };
        assert!(coupon.evaluate(Money::from_cents(100), now + Duration::days(3650)).is_ok());
    }

    #[test]
    fn test_inactive_checked_before_expiry() {
        let now = Utc::now();
        let coupon = CouponRules {
            is_active: false,
            valid_until: Some(now - Duration::days(1)),
            ..rules(now)
        };
        assert_eq!(
            coupon.evaluate(Money::from_cents(10_000), now),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_usage_limit() {
        let now = Utc::now();
        let coupon = CouponRules {
            usage_limit: Some(3),
            used_count: 3,
            ..rules(now)
        };
        assert_eq!(
            coupon.evaluate(Money::from_cents(10_000), now),
            Err(CouponRejection::UsageLimitReached)
        );

        let coupon = CouponRules {
            used_count: 2,
            ..coupon
        };
        assert!(coupon.evaluate(Money::from_cents(10_000), now).is_ok());
    }

    #[test]
    fn test_minimum_order() {
        let now = Utc::now();
        let coupon = CouponRules {
            min_order_amount: Money::from_cents(49_900),
            ..rules(now)
        };
        let err = coupon.evaluate(Money::from_cents(40_000), now).unwrap_err();
        assert_eq!(
            err,
            CouponRejection::BelowMinimumOrder {
                minimum: Money::from_cents(49_900),
                shortfall: Money::from_cents(9_900),
            }
        );
        assert_eq!(
            err.to_string(),
            "Add $99.00 more to use this coupon (minimum order $499.00)"
        );
        assert!(coupon.evaluate(Money::from_cents(49_900), now).is_ok());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  glow20 ").unwrap(), "GLOW20");
        assert_eq!(normalize_code("new-user_10").unwrap(), "NEW-USER_10");
        assert_eq!(normalize_code(" "), Err(CouponFieldError::EmptyCode));
        assert_eq!(normalize_code("GLOW 20"), Err(CouponFieldError::InvalidCharacters));
        assert_eq!(normalize_code(&"A".repeat(33)), Err(CouponFieldError::CodeTooLong));
    }

    #[test]
    fn test_validate_percent() {
        assert_eq!(validate_percent(1).unwrap(), 1);
        assert_eq!(validate_percent(100).unwrap(), 100);
        assert_eq!(validate_percent(0), Err(CouponFieldError::PercentOutOfRange(0)));
        assert_eq!(validate_percent(101), Err(CouponFieldError::PercentOutOfRange(101)));
        assert_eq!(validate_percent(-5), Err(CouponFieldError::PercentOutOfRange(-5)));
    }

    #[test]
    fn test_window_check() {
        let now = Utc::now();
        let coupon = CouponRules {
            valid_until: Some(now - Duration::days(2)),
            ..rules(now)
        };
        assert_eq!(coupon.check_window(), Err(CouponFieldError::InvertedWindow));
        assert!(rules(now).check_window().is_ok());
    }
}
