//! Dewy database layer.
//!
//! # Database
//!
//! A single `PostgreSQL` database shared by the storefront and the admin
//! back office. Shop tables live in the `shop` schema; sessions live in
//! `tower_sessions.session`.
//!
//! ## Tables
//!
//! - `user_profile` - customer and admin accounts
//! - `category`, `product` - catalog
//! - `cart`, `cart_item` - user or anonymous carts
//! - `address` - up to two shipping addresses per user
//! - `coupon` - percentage discount codes
//! - `orders`, `order_item`, `order_status_history`, `payment`
//! - `wishlist_item`
//! - `delivery_time_mapping` - postal code patterns to delivery windows
//! - `chat_session`, `chat_message` - support chatbot transcripts
//! - `analytics_event` - storefront events
//!
//! # Migrations
//!
//! Migrations live in the workspace `migrations/` directory and run via:
//! ```bash
//! cargo run -p dewy-cli -- migrate
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod addresses;
pub mod analytics;
pub mod carts;
pub mod categories;
pub mod chat;
pub mod coupons;
pub mod delivery;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlist;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use analytics::AnalyticsRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use chat::ChatRepository;
pub use coupons::CouponRepository;
pub use delivery::DeliveryRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use users::UserRepository;
pub use wishlist::WishlistRepository;

// Relative to crates/db/Cargo.toml; resolves to <workspace-root>/migrations/
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A business rule refused the write. The message is safe to show users.
    #[error("{0}")]
    Validation(String),
}

impl RepositoryError {
    /// Map unique violations to [`RepositoryError::Conflict`] with `message`.
    pub(crate) fn on_unique_violation(err: sqlx::Error, message: &str) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && db_err.is_unique_violation()
        {
            return Self::Conflict(message.to_owned());
        }
        Self::Database(err)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// `SELECT 1` readiness probe.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(pool).await?;
    Ok(())
}

/// One page of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub per_page: i64,
}

impl Page {
    /// Build a page, clamping `number` to 1 and `per_page` to `1..=100`.
    #[must_use]
    pub fn new(number: i64, per_page: i64) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    #[must_use]
    pub const fn offset(self) -> i64 {
        (self.number - 1) * self.per_page
    }

    #[must_use]
    pub const fn limit(self) -> i64 {
        self.per_page
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub const fn page_count(self, total: i64) -> i64 {
        if total <= 0 {
            1
        } else {
            (total + self.per_page - 1) / self.per_page
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1, 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_inputs() {
        let page = Page::new(0, 1000);
        assert_eq!(page.number, 1);
        assert_eq!(page.per_page, 100);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn page_offsets_and_counts() {
        let page = Page::new(3, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.page_count(0), 1);
        assert_eq!(page.page_count(41), 3);
        assert_eq!(page.page_count(60), 3);
    }
}
