//! Monetary amounts.
//!
//! All prices in the shop are in a single currency and carried as
//! [`rust_decimal::Decimal`] rounded to two places. Floats never touch money.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors from parsing an amount typed into an admin form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount is not a number: {0}")]
    Invalid(String),
    #[error("amount cannot be negative")]
    Negative,
}

/// A non-negative amount with two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Currency symbol used when rendering amounts.
    pub const SYMBOL: &'static str = "$";

    /// Wrap a decimal, rounding half away from zero to cents.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Const constructor for fixed amounts such as fees and thresholds.
    #[must_use]
    pub const fn const_cents(cents: u32) -> Self {
        Self(Decimal::from_parts(cents, 0, 0, false, 2))
    }

    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `percent`% of this amount, rounded to cents.
    #[must_use]
    pub fn percent(self, percent: u8) -> Self {
        Self::new(self.0 * Decimal::from(percent) / Decimal::ONE_HUNDRED)
    }

    /// Subtraction floored at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - other.0)
        }
    }

    /// The amount without a currency symbol, e.g. `"1249.00"`.
    #[must_use]
    pub fn plain(self) -> String {
        format!("{:.2}", self.0)
    }

    /// Parse an amount from user input such as `"24.5"` or `"$24.50"`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] if the input is not a decimal or is negative.
    pub fn parse(input: &str) -> Result<Self, MoneyError> {
        let trimmed = input.trim().trim_start_matches(Self::SYMBOL).replace(',', "");
        let value = Decimal::from_str(&trimmed)
            .map_err(|_| MoneyError::Invalid(input.trim().to_owned()))?;
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self::new(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", Self::SYMBOL, self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    /// Plain subtraction; callers that may go below zero use
    /// [`Money::saturating_sub`].
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_half_away_from_zero() {
        assert_eq!(Money::new(Decimal::new(10_005, 3)), Money::from_cents(1001));
        assert_eq!(Money::new(Decimal::new(10_004, 3)), Money::from_cents(1000));
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(124_900).to_string(), "$1249.00");
        assert_eq!(Money::from_cents(5).plain(), "0.05");
        assert_eq!(Money::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(Money::from_cents(99_900).percent(15), Money::from_cents(14_985));
        assert_eq!(Money::from_cents(333).percent(10), Money::from_cents(33));
    }

    #[test]
    fn test_saturating_sub() {
        let a = Money::from_cents(500);
        let b = Money::from_cents(700);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_cents(200));
    }

    #[test]
    fn test_parse() {
        assert_eq!(Money::parse("24.5").unwrap(), Money::from_cents(2450));
        assert_eq!(Money::parse(" $1,024.00 ").unwrap(), Money::from_cents(102_400));
        assert_eq!(Money::parse("-3"), Err(MoneyError::Negative));
        assert!(matches!(Money::parse("abc"), Err(MoneyError::Invalid(_))));
    }

    #[test]
    fn test_line_multiplication_and_sum() {
        let lines = [Money::from_cents(1250) * 2, Money::from_cents(399) * 3];
        assert_eq!(lines.into_iter().sum::<Money>(), Money::from_cents(3697));
    }
}
