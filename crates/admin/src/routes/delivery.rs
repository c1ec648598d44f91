//! Delivery time mappings: postal code prefixes to delivery windows.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::DeliveryMappingId;
use dewy_core::delivery::DEFAULT_ESTIMATE;
use dewy_db::delivery::DeliveryMapping;
use dewy_db::{DeliveryRepository, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{AdminPage, RequireAdmin};
use crate::routes::{Flash, with_message};
use crate::state::AppState;

/// Mapping form, used for both create and inline edit.
#[derive(Debug, Deserialize)]
pub struct MappingForm {
    pub pattern: String,
    pub min_days: String,
    pub max_days: String,
    pub is_active: Option<String>,
}

impl MappingForm {
    /// Parse the day counts. Pattern and range rules are checked by the
    /// repository.
    fn days(&self) -> std::result::Result<(i32, i32), String> {
        let parse = |raw: &str, label: &str| {
            raw.trim()
                .parse::<i32>()
                .map_err(|_| format!("{label} must be a whole number of days"))
        };
        Ok((
            parse(&self.min_days, "Minimum")?,
            parse(&self.max_days, "Maximum")?,
        ))
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "delivery/index.html")]
pub struct DeliveryTemplate {
    pub page: AdminPage,
    pub mappings: Vec<DeliveryMapping>,
    pub default_min_days: i32,
    pub default_max_days: i32,
    pub flash: Flash,
}

/// List mappings, longest pattern first (the order they are matched in).
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse> {
    let mappings = DeliveryRepository::new(state.pool()).list().await?;
    Ok(DeliveryTemplate {
        page,
        mappings,
        default_min_days: DEFAULT_ESTIMATE.min_days,
        default_max_days: DEFAULT_ESTIMATE.max_days,
        flash,
    })
}

fn outcome(result: std::result::Result<DeliveryMapping, RepositoryError>, done: &str) -> Result<Redirect> {
    match result {
        Ok(_) => Ok(Redirect::to(&with_message("/delivery", "success", done))),
        Err(RepositoryError::Validation(message) | RepositoryError::Conflict(message)) => {
            Ok(Redirect::to(&with_message("/delivery", "error", &message)))
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Delivery mapping".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Add a mapping.
#[instrument(skip(state, admin, form), fields(pattern = %form.pattern))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<MappingForm>,
) -> Result<Redirect> {
    let (min_days, max_days) = match form.days() {
        Ok(days) => days,
        Err(message) => return Ok(Redirect::to(&with_message("/delivery", "error", &message))),
    };
    let result = DeliveryRepository::new(state.pool())
        .create(&form.pattern, min_days, max_days, form.is_active.is_some())
        .await;
    if let Ok(mapping) = &result {
        tracing::info!(mapping_id = %mapping.id, admin = %admin.id, "delivery mapping created");
    }
    outcome(result, "Mapping added")
}

/// Edit a mapping.
#[instrument(skip(state, admin, form))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DeliveryMappingId>,
    Form(form): Form<MappingForm>,
) -> Result<Redirect> {
    let (min_days, max_days) = match form.days() {
        Ok(days) => days,
        Err(message) => return Ok(Redirect::to(&with_message("/delivery", "error", &message))),
    };
    let result = DeliveryRepository::new(state.pool())
        .update(id, &form.pattern, min_days, max_days, form.is_active.is_some())
        .await;
    if result.is_ok() {
        tracing::info!(mapping_id = %id, admin = %admin.id, "delivery mapping updated");
    }
    outcome(result, "Mapping saved")
}

/// Remove a mapping.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DeliveryMappingId>,
) -> Result<Redirect> {
    match DeliveryRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(mapping_id = %id, admin = %admin.id, "delivery mapping deleted");
            Ok(Redirect::to(&with_message("/delivery", "success", "Mapping removed")))
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Delivery mapping".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_days() {
        let form = MappingForm {
            pattern: "560".to_string(),
            min_days: " 2 ".to_string(),
            max_days: "4".to_string(),
            is_active: Some("on".to_string()),
        };
        assert_eq!(form.days().unwrap(), (2, 4));

        let bad = MappingForm {
            max_days: "four".to_string(),
            ..form
        };
        assert_eq!(
            bad.days().unwrap_err(),
            "Maximum must be a whole number of days"
        );
    }
}
