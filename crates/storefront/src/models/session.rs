//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use dewy_core::{Email, UserId};
use dewy_db::users::User;

/// Session-stored user identity.
///
/// Minimal data stored in the session to identify the logged-in customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// User's email address.
    pub email: Email,
    /// Display name for the header.
    pub full_name: String,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
        }
    }
}

impl CurrentUser {
    /// First word of the name, for greetings.
    #[must_use]
    pub fn first_name(&self) -> &str {
        self.full_name
            .split_whitespace()
            .next()
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Random token identifying an anonymous cart.
    pub const CART_TOKEN: &str = "cart_token";

    /// Coupon code accepted by the cart-page preview, prefilled at checkout.
    pub const COUPON_CODE: &str = "coupon_code";

    /// Support assistant conversation id.
    pub const CHAT_SESSION: &str = "chat_session";
}
