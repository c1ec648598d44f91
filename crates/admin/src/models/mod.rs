//! Session models for the back office.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
