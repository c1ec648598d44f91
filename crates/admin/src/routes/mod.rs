//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! # Auth (rate limited)
//! GET  /login, POST /login
//! POST /logout
//!
//! GET  /                                 - Dashboard
//!
//! # Catalog
//! GET  /products                         - Listing (?q=&page=), inactive included
//! GET  /products/new, POST /products     - Create
//! GET  /products/{id}/edit               - Edit form
//! POST /products/{id}                    - Update
//! POST /products/{id}/toggle             - Activate / deactivate
//! POST /products/{id}/delete             - Hard delete
//! GET  /categories, POST /categories     - List and create
//! POST /categories/{id}/delete
//!
//! # Orders
//! GET  /orders                           - Listing (?status=&q=&page=)
//! GET  /orders/{id}                      - Detail with history
//! POST /orders/{id}/status               - Transition, history row, email
//!
//! # Promotions and shipping
//! GET  /coupons, GET /coupons/new, POST /coupons
//! GET  /coupons/{id}/edit, POST /coupons/{id}
//! POST /coupons/{id}/toggle, POST /coupons/{id}/delete
//! GET  /delivery, POST /delivery
//! POST /delivery/{id}, POST /delivery/{id}/delete
//!
//! # Insight
//! GET  /customers                        - Customers with lifetime value (?q=&page=)
//! GET  /chatbot                          - Support transcripts
//! GET  /chatbot/{session_id}
//! GET  /analytics                        - Sales and events (?days=)
//!
//! # API
//! GET  /api/export/orders.csv            - CSV export (?from=&to=)
//! POST /api/upload                       - Product image upload -> {"url": ...}
//! ```

pub mod analytics;
pub mod api;
pub mod auth;
pub mod categories;
pub mod chatbot;
pub mod coupons;
pub mod customers;
pub mod dashboard;
pub mod delivery;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use serde::Deserialize;

use crate::middleware::login_rate_limiter;
use crate::state::AppState;

/// Flash message carried across a redirect as `?success=` or `?error=`.
#[derive(Debug, Default, Deserialize)]
pub struct Flash {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// `path` with a URL-encoded flash parameter, e.g. `?error=...`.
pub(crate) fn with_message(path: &str, key: &str, message: &str) -> String {
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{key}={}", urlencoding::encode(message))
}

/// Empty or whitespace-only form fields become `None`.
pub(crate) fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/new", get(products::new))
        .route("/{id}", post(products::update))
        .route("/{id}/edit", get(products::edit))
        .route("/{id}/toggle", post(products::toggle))
        .route("/{id}/delete", post(products::delete))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(coupons::index).post(coupons::create))
        .route("/new", get(coupons::new))
        .route("/{id}", post(coupons::update))
        .route("/{id}/edit", get(coupons::edit))
        .route("/{id}/toggle", post(coupons::toggle))
        .route("/{id}/delete", post(coupons::delete))
}

/// Create the JSON/CSV API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/export/orders.csv", get(api::export::orders_csv))
        .route(
            "/upload",
            post(api::upload::upload).layer(DefaultBodyLimit::max(api::upload::BODY_LIMIT)),
        )
}

/// Create all routes for the admin panel.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::index))
        .route(
            "/login",
            get(auth::login_page)
                .post(auth::login)
                .layer(login_rate_limiter()),
        )
        .route("/logout", post(auth::logout))
        .nest("/products", product_routes())
        .route("/categories", get(categories::index).post(categories::create))
        .route("/categories/{id}/delete", post(categories::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .nest("/coupons", coupon_routes())
        .route("/delivery", get(delivery::index).post(delivery::create))
        .route("/delivery/{id}", post(delivery::update))
        .route("/delivery/{id}/delete", post(delivery::delete))
        .route("/customers", get(customers::index))
        .route("/chatbot", get(chatbot::index))
        .route("/chatbot/{session_id}", get(chatbot::show))
        .route("/analytics", get(analytics::index))
        .nest("/api", api_routes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_encoded() {
        assert_eq!(
            with_message("/orders/12", "error", "cannot move an order from shipped to pending"),
            "/orders/12?error=cannot%20move%20an%20order%20from%20shipped%20to%20pending"
        );
        assert_eq!(
            with_message("/orders?status=pending", "success", "Saved"),
            "/orders?status=pending&success=Saved"
        );
    }

    #[test]
    fn blank_fields_are_none() {
        assert_eq!(non_empty("   "), None);
        assert_eq!(non_empty(" Niacinamide "), Some("Niacinamide".to_string()));
    }
}
