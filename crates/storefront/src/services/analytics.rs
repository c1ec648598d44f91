//! Server-side analytics events.
//!
//! Events the browser cannot report reliably (a placed order, a checkout
//! visit) are recorded here. Recording never blocks or fails a request.

use serde_json::Value;
use sqlx::PgPool;
use tower_sessions::Session;

use dewy_core::{ProductId, UserId};
use dewy_db::AnalyticsRepository;
use dewy_db::analytics::NewEvent;

/// Build an event attributed to the current browser session.
#[must_use]
pub fn event(
    event_type: &str,
    session: &Session,
    user_id: Option<UserId>,
    product_id: Option<ProductId>,
    page_path: Option<&str>,
    metadata: Value,
) -> NewEvent {
    NewEvent {
        event_type: event_type.to_string(),
        session_id: session.id().map(|id| id.to_string()),
        user_id,
        product_id,
        page_path: page_path.map(String::from),
        metadata,
    }
}

/// Record `event` in the background. Failures are logged.
pub fn track(pool: &PgPool, event: NewEvent) {
    let pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = AnalyticsRepository::new(&pool).record_event(&event).await {
            tracing::warn!(event_type = %event.event_type, error = %e, "failed to record analytics event");
        }
    });
}
