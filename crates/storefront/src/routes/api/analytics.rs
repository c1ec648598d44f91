//! Analytics ingestion.
//!
//! The browser beacons page views, product views and searches here. Bad
//! payloads are rejected with 400 so client bugs surface; storage failures
//! are logged and still answered with 204 so tracking never breaks a page.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::ProductId;
use dewy_db::AnalyticsRepository;
use dewy_db::analytics::{NewEvent, is_known_event};

use crate::error::{AppError, JsonError};
use crate::middleware::OptionalAuth;
use crate::services::analytics as tracking;
use crate::state::AppState;

const MAX_PATH_LENGTH: usize = 512;

/// Event payload.
#[derive(Debug, Deserialize)]
pub struct AnalyticsPayload {
    pub event_type: String,
    pub page_path: Option<String>,
    pub product_id: Option<ProductId>,
    pub metadata: Option<Value>,
}

/// Check a payload, returning its metadata object.
fn validate(payload: &AnalyticsPayload) -> Result<Value, AppError> {
    if !is_known_event(&payload.event_type) {
        return Err(AppError::BadRequest(format!(
            "unknown event type: {}",
            payload.event_type
        )));
    }
    if let Some(path) = &payload.page_path
        && (!path.starts_with('/') || path.len() > MAX_PATH_LENGTH)
    {
        return Err(AppError::BadRequest("invalid page_path".to_string()));
    }
    match &payload.metadata {
        None | Some(Value::Null) => Ok(Value::Object(serde_json::Map::new())),
        Some(value @ Value::Object(_)) => Ok(value.clone()),
        Some(_) => Err(AppError::BadRequest(
            "metadata must be an object".to_string(),
        )),
    }
}

/// Record one analytics event.
#[instrument(skip(state, session, user, payload))]
pub async fn ingest(
    State(state): State<AppState>,
    session: Session,
    user: OptionalAuth,
    payload: Result<Json<AnalyticsPayload>, JsonRejection>,
) -> Result<StatusCode, JsonError> {
    let Json(payload) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let metadata = validate(&payload)?;
    let event: NewEvent = tracking::event(
        &payload.event_type,
        &session,
        user.0.as_ref().map(|u| u.id),
        payload.product_id,
        payload.page_path.as_deref(),
        metadata,
    );

    if let Err(e) = AnalyticsRepository::new(state.pool()).record_event(&event).await {
        tracing::warn!(event_type = %event.event_type, error = %e, "failed to record analytics event");
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> AnalyticsPayload {
        serde_json::from_value(value).unwrap_or_else(|e| panic!("bad fixture: {e}"))
    }

    #[test]
    fn accepts_known_events() {
        let metadata = validate(&payload(json!({
            "event_type": "product_view",
            "page_path": "/products/barrier-repair-serum",
            "product_id": 7,
            "metadata": { "source": "related" }
        })))
        .unwrap_or_else(|e| panic!("rejected: {e}"));
        assert_eq!(metadata["source"], "related");

        let metadata = validate(&payload(json!({ "event_type": "page_view" })))
            .unwrap_or_else(|e| panic!("rejected: {e}"));
        assert_eq!(metadata, json!({}));
    }

    #[test]
    fn rejects_bad_payloads() {
        for bad in [
            json!({ "event_type": "scroll_depth" }),
            json!({ "event_type": "page_view", "page_path": "https://evil.example/" }),
            json!({ "event_type": "search", "metadata": ["serum"] }),
        ] {
            let err = validate(&payload(bad)).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }
}
