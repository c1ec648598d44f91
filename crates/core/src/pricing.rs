//! Order totals and order numbers.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::{Money, ProductId};

/// Flat shipping charged below [`FREE_SHIPPING_THRESHOLD`].
pub const SHIPPING_FEE: Money = Money::const_cents(4_900);

/// Orders at or above this amount (after discount) ship free.
pub const FREE_SHIPPING_THRESHOLD: Money = Money::const_cents(49_900);

/// One cart line priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i32,
}

impl PricedLine {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * u32::try_from(self.quantity).unwrap_or(0)
    }
}

/// Breakdown shown on the cart page and stored on the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderQuote {
    pub subtotal: Money,
    pub discount: Money,
    pub shipping_fee: Money,
    pub total: Money,
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(lines: &[PricedLine]) -> Money {
    lines.iter().map(PricedLine::line_total).sum()
}

/// Shipping for a discounted subtotal.
#[must_use]
pub fn shipping_for(discounted_subtotal: Money) -> Money {
    if discounted_subtotal.is_zero() || discounted_subtotal >= FREE_SHIPPING_THRESHOLD {
        Money::ZERO
    } else {
        SHIPPING_FEE
    }
}

/// Price an order. `discount` is clamped to the subtotal.
#[must_use]
pub fn quote(lines: &[PricedLine], discount: Money) -> OrderQuote {
    let subtotal = subtotal(lines);
    if lines.is_empty() {
        return OrderQuote::default();
    }
    let discount = discount.min(subtotal);
    let discounted = subtotal.saturating_sub(discount);
    let shipping_fee = shipping_for(discounted);
    OrderQuote {
        subtotal,
        discount,
        shipping_fee,
        total: discounted + shipping_fee,
    }
}

/// Human-facing order number, e.g. `DW-20250114-7QK2MX`.
///
/// The suffix avoids `0`, `O`, `1` and `I` so it can be read over the phone.
pub fn generate_order_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    const ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.random_range(0..ALPHABET.len());
            ALPHABET.get(idx).map_or('X', |b| char::from(*b))
        })
        .collect();
    format!("DW-{}-{suffix}", now.format("%Y%m%d"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn line(id: i32, cents: i64, quantity: i32) -> PricedLine {
        PricedLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            unit_price: Money::from_cents(cents),
            quantity,
        }
    }

    #[test]
    fn test_small_order_pays_shipping() {
        let q = quote(&[line(1, 19_900, 1)], Money::ZERO);
        assert_eq!(q.subtotal, Money::from_cents(19_900));
        assert_eq!(q.shipping_fee, SHIPPING_FEE);
        assert_eq!(q.total, Money::from_cents(24_800));
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let q = quote(&[line(1, 24_950, 2)], Money::ZERO);
        assert_eq!(q.subtotal, FREE_SHIPPING_THRESHOLD);
        assert_eq!(q.shipping_fee, Money::ZERO);
        assert_eq!(q.total, FREE_SHIPPING_THRESHOLD);
    }

    #[test]
    fn test_discount_can_reintroduce_shipping() {
        let q = quote(&[line(1, 60_000, 1)], Money::from_cents(20_000));
        assert_eq!(q.discount, Money::from_cents(20_000));
        assert_eq!(q.shipping_fee, SHIPPING_FEE);
        assert_eq!(q.total, Money::from_cents(44_900));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let q = quote(&[line(1, 1_000, 1)], Money::from_cents(5_000));
        assert_eq!(q.discount, Money::from_cents(1_000));
        assert_eq!(q.total, Money::ZERO);
    }

    #[test]
    fn test_empty_cart_is_free() {
        assert_eq!(quote(&[], Money::from_cents(100)), OrderQuote::default());
    }

    #[test]
    fn test_order_number_format() {
        let now = Utc.with_ymd_and_hms(2025, 1, 14, 9, 30, 0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let number = generate_order_number(now, &mut rng);
        assert!(number.starts_with("DW-20250114-"));
        assert_eq!(number.len(), "DW-20250114-".len() + 6);
        let suffix = number.rsplit('-').next().unwrap();
        assert!(!suffix.contains(['0', 'O', '1', 'I']));
    }
}
