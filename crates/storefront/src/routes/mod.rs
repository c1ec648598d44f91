//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                            - Home page
//!
//! # Catalog
//! GET  /products                    - Listing (?category=&q=&sort=&page=)
//! GET  /products/{slug}             - Product detail
//! GET  /categories/{slug}           - Listing for one category
//!
//! # Cart (HTMX fragments)
//! GET  /cart                        - Cart page
//! POST /cart/add                    - Add (count badge, triggers cart-updated)
//! POST /cart/update                 - Set quantity (cart_items fragment)
//! POST /cart/remove                 - Remove line (cart_items fragment)
//! GET  /cart/count                  - Count badge fragment
//! POST /cart/coupon                 - Coupon preview (JSON)
//!
//! # Checkout and orders (require auth)
//! GET  /checkout                    - Checkout page
//! POST /checkout                    - Place order
//! GET  /orders                      - Order history
//! GET  /orders/{number}             - Order detail and timeline
//! POST /orders/{number}/cancel      - Cancel
//!
//! # Wishlist and account (require auth)
//! GET  /wishlist                    - Wishlist
//! POST /wishlist/toggle             - Toggle (heart fragment)
//! GET  /account, POST /account      - Profile
//! GET  /account/addresses           - Address book
//! POST /account/addresses           - Add address
//! POST /account/addresses/{id}      - Edit address
//! POST /account/addresses/{id}/delete
//! POST /account/addresses/{id}/default
//!
//! GET  /delivery/estimate           - ?postal_code= (fragment or JSON)
//!
//! # Auth (rate limited)
//! GET  /auth/login, POST /auth/login
//! GET  /auth/register, POST /auth/register
//! POST /auth/logout
//!
//! # API (rate limited)
//! POST /api/analytics               - Event ingestion
//! POST /api/chat                    - Support assistant
//! ```

pub mod account;
pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod home;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Whether the request came from HTMX.
pub(crate) fn is_htmx(headers: &HeaderMap) -> bool {
    headers.contains_key("hx-request")
}

/// `path` with a URL-encoded flash parameter, e.g. `?error=...`.
pub(crate) fn with_message(path: &str, key: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{key}={}", urlencoding::encode(message))
}

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", post(auth::logout))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/analytics", post(api::analytics::ingest))
        .route("/chat", post(api::chat::send))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{slug}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
        .route("/coupon", post(cart::coupon))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{number}", get(orders::show))
        .route("/{number}/cancel", post(orders::cancel))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::show).post(account::update))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route("/addresses/{id}", post(account::update_address))
        .route("/addresses/{id}/delete", post(account::delete_address))
        .route("/addresses/{id}/default", post(account::set_default_address))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .nest("/products", product_routes())
        .route("/categories/{slug}", get(products::category))
        .nest("/cart", cart_routes())
        .route("/checkout", get(checkout::show).post(checkout::place))
        .nest("/orders", order_routes())
        .route("/wishlist", get(wishlist::index))
        .route("/wishlist/toggle", post(wishlist::toggle))
        .nest("/account", account_routes())
        .route("/delivery/estimate", get(delivery::estimate))
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api_routes().layer(api_rate_limiter()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_encoded() {
        assert_eq!(
            with_message("/checkout", "error", "Only 2 left of Serum & Co"),
            "/checkout?error=Only%202%20left%20of%20Serum%20%26%20Co"
        );
        assert_eq!(
            with_message("/orders/DW-1?placed=1", "success", "ok"),
            "/orders/DW-1?placed=1&success=ok"
        );
    }

    #[test]
    fn htmx_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_htmx(&headers));
        headers.insert("hx-request", axum::http::HeaderValue::from_static("true"));
        assert!(is_htmx(&headers));
    }
}
