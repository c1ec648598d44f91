//! Resolving the visitor's cart.
//!
//! Signed-in customers own one cart keyed by user id. Anonymous visitors get
//! a random token in their session, created on the first add-to-cart; on
//! login that cart is merged into the user's.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use rand::RngCore;
use sqlx::PgPool;
use tower_sessions::Session;

use dewy_core::pricing::{self, OrderQuote, PricedLine};
use dewy_core::{CartId, Money, UserId};
use dewy_db::carts::CartItem;
use dewy_db::coupons::CouponCheck;
use dewy_db::{CartRepository, CouponRepository};

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

/// A fresh 256-bit anonymous cart token.
#[must_use]
pub fn new_cart_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

async fn session_token(session: &Session) -> Result<Option<String>, AppError> {
    Ok(session.get::<String>(session_keys::CART_TOKEN).await?)
}

/// The visitor's cart, if one exists. Never creates anything.
///
/// # Errors
///
/// Returns `AppError` if the session or database lookup fails.
pub async fn find_cart(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<Option<CartId>, AppError> {
    let carts = CartRepository::new(pool);
    if let Some(user) = user {
        return Ok(carts.find_for_user(user.id).await?);
    }
    match session_token(session).await? {
        Some(token) => Ok(carts.find_for_session(&token).await?),
        None => Ok(None),
    }
}

/// The visitor's cart, created on demand.
///
/// # Errors
///
/// Returns `AppError` if the session or database write fails.
pub async fn ensure_cart(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<CartId, AppError> {
    let carts = CartRepository::new(pool);
    if let Some(user) = user {
        return Ok(carts.get_or_create_for_user(user.id).await?);
    }

    let token = match session_token(session).await? {
        Some(token) => token,
        None => {
            let token = new_cart_token();
            session.insert(session_keys::CART_TOKEN, &token).await?;
            token
        }
    };
    Ok(carts.get_or_create_for_session(&token).await?)
}

/// Total units in the visitor's cart.
///
/// # Errors
///
/// Returns `AppError` if the session or database lookup fails.
pub async fn item_count(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
) -> Result<i64, AppError> {
    match find_cart(pool, session, user).await? {
        Some(cart_id) => Ok(CartRepository::new(pool).item_count(cart_id).await?),
        None => Ok(0),
    }
}

/// Fold the anonymous cart into `user_id`'s cart and forget the token.
///
/// Call before the session id is cycled on login; the token survives the
/// cycle either way since `cycle_id` keeps session data.
///
/// # Errors
///
/// Returns `AppError` if the merge transaction fails. The token is kept in
/// that case so nothing is lost.
pub async fn merge_on_login(
    pool: &PgPool,
    session: &Session,
    user_id: UserId,
) -> Result<usize, AppError> {
    let Some(token) = session_token(session).await? else {
        return Ok(0);
    };

    let merged = CartRepository::new(pool)
        .merge_session_into_user(&token, user_id)
        .await?;
    session.remove::<String>(session_keys::CART_TOKEN).await?;

    if merged > 0 {
        tracing::info!(user_id = %user_id, lines = merged, "merged anonymous cart");
    }
    Ok(merged)
}

/// Coupon code remembered from the cart page.
///
/// # Errors
///
/// Returns `AppError` if the session cannot be read.
pub async fn applied_coupon(session: &Session) -> Result<Option<String>, AppError> {
    Ok(session.get::<String>(session_keys::COUPON_CODE).await?)
}

/// Remember (or with `None`, forget) the applied coupon code.
///
/// # Errors
///
/// Returns `AppError` if the session cannot be written.
pub async fn remember_coupon(session: &Session, code: Option<&str>) -> Result<(), AppError> {
    match code {
        Some(code) => session.insert(session_keys::COUPON_CODE, code).await?,
        None => {
            session.remove::<String>(session_keys::COUPON_CODE).await?;
        }
    }
    Ok(())
}

/// Cart contents priced for display.
#[derive(Debug, Clone, Default)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub quote: OrderQuote,
    /// Remembered coupon code, whether or not it currently applies.
    pub coupon_code: Option<String>,
    /// Why the remembered coupon does not apply right now.
    pub coupon_problem: Option<String>,
}

impl CartSummary {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn item_count(&self) -> i64 {
        self.items.iter().map(|item| i64::from(item.quantity)).sum()
    }

    /// Lines that checkout would refuse as they stand.
    #[must_use]
    pub fn has_unavailable(&self) -> bool {
        self.items.iter().any(|item| !item.is_purchasable())
    }
}

/// Load and price the visitor's cart, applying the remembered coupon.
///
/// Prices are always the catalog's current prices. The order is priced
/// again inside the checkout transaction; this is a preview.
///
/// # Errors
///
/// Returns `AppError` if the session or database lookup fails.
pub async fn summarize(
    pool: &PgPool,
    session: &Session,
    user: Option<&CurrentUser>,
    now: DateTime<Utc>,
) -> Result<CartSummary, AppError> {
    let Some(cart_id) = find_cart(pool, session, user).await? else {
        return Ok(CartSummary::default());
    };
    let items = CartRepository::new(pool).lines(cart_id).await?;
    let coupon_code = applied_coupon(session).await?;

    let priced: Vec<PricedLine> = items.iter().map(CartItem::priced).collect();
    let mut discount = Money::ZERO;
    let mut coupon_problem = None;
    if let Some(code) = coupon_code.as_deref() {
        match CouponRepository::new(pool)
            .check(code, pricing::subtotal(&priced), now)
            .await?
        {
            CouponCheck::Applied { discount: d, .. } => discount = d,
            CouponCheck::Rejected(rejection) => coupon_problem = Some(rejection.to_string()),
        }
    }

    Ok(CartSummary {
        quote: pricing::quote(&priced, discount),
        items,
        coupon_code,
        coupon_problem,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_long_and_url_safe() {
        let a = new_cart_token();
        let b = new_cart_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn empty_summary() {
        let summary = CartSummary::default();
        assert!(summary.is_empty());
        assert_eq!(summary.item_count(), 0);
        assert!(!summary.has_unavailable());
        assert_eq!(summary.quote.total, Money::ZERO);
    }
}
