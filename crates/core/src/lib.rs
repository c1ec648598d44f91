//! Dewy Core - domain types and rules shared by every Dewy binary.
//!
//! - `storefront` - public shop (catalog, cart, checkout, account)
//! - `admin` - back office (catalog management, orders, reports)
//! - `cli` - migrations, admin bootstrap, demo data
//!
//! # Architecture
//!
//! No I/O lives here: no database access, no HTTP. Everything that decides
//! whether an order, coupon or cart change is valid is a plain function so
//! it can be unit tested and reused inside database transactions.
//!
//! # Modules
//!
//! - [`types`] - typed ids, emails, money, roles and payment enums
//! - [`order_status`] - the order lifecycle transition table
//! - [`coupon`] - coupon validation and discount computation
//! - [`cart`] - quantity limits and anonymous-cart merging
//! - [`pricing`] - order totals, shipping and order numbers
//! - [`delivery`] - postal-code pattern matching for delivery estimates

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod coupon;
pub mod delivery;
pub mod order_status;
pub mod pricing;
pub mod types;

pub use order_status::{OrderStatus, TransitionError};
pub use types::*;
