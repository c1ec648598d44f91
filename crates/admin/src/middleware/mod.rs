//! HTTP middleware stack for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. Security headers (stricter CSP than the storefront)
//! 5. Session layer (tower-sessions, `SameSite=Strict`, 24 hour expiry)
//! 6. Rate limiting on the login form (governor)
//!
//! Every route except `/login` and the health checks takes a
//! [`RequireAdmin`] or [`AdminPage`] extractor.

pub mod auth;
pub mod page;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{RequireAdmin, clear_current_admin, set_current_admin};
pub use page::AdminPage;
pub use rate_limit::login_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
