//! Delivery estimate lookup.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use dewy_core::delivery::normalize_postal_code;
use dewy_db::DeliveryRepository;

use crate::error::Result;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EstimateQuery {
    #[serde(default)]
    pub postal_code: String,
}

/// JSON answer for API clients.
#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub postal_code: String,
    pub min_days: i32,
    pub max_days: i32,
    pub label: String,
}

/// Estimate fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/delivery_estimate.html")]
pub struct EstimateTemplate {
    pub postal_code: String,
    pub label: Option<String>,
    pub error: Option<String>,
}

fn wants_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// Estimate the delivery window for a postal code.
///
/// Responds with JSON when asked for it, otherwise with an HTML fragment.
/// A malformed code is a 400 for JSON clients and an inline message for
/// the fragment so HTMX still swaps it in.
#[instrument(skip(state, headers))]
pub async fn estimate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EstimateQuery>,
) -> Result<Response> {
    let json = wants_json(&headers);

    let postal_code = match normalize_postal_code(&query.postal_code) {
        Ok(code) => code,
        Err(e) => {
            let message = e.to_string();
            if json {
                return Ok((
                    StatusCode::BAD_REQUEST,
                    Json(serde_json::json!({ "error": message })),
                )
                    .into_response());
            }
            return Ok(EstimateTemplate {
                postal_code: query.postal_code,
                label: None,
                error: Some(message),
            }
            .into_response());
        }
    };

    let estimate = DeliveryRepository::new(state.pool())
        .estimate(&postal_code)
        .await?;
    let label = estimate.to_string();

    if json {
        return Ok(Json(EstimateResponse {
            postal_code,
            min_days: estimate.min_days,
            max_days: estimate.max_days,
            label,
        })
        .into_response());
    }
    Ok(EstimateTemplate {
        postal_code,
        label: Some(label),
        error: None,
    }
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn json_is_negotiated_from_accept() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert!(!wants_json(&headers));
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        assert!(wants_json(&headers));
    }
}
