//! JSON endpoints called from the storefront's scripts.

pub mod analytics;
pub mod chat;
