//! Business logic services for the storefront.
//!
//! - `analytics` - server-side event recording
//! - `auth` - customer registration and password login
//! - `cart` - resolving anonymous and signed-in carts, merge on login
//! - `chat` - support assistant (completion client plus transcript storage)

pub mod analytics;
pub mod auth;
pub mod cart;
pub mod chat;
