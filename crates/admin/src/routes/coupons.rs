//! Coupon management.
//!
//! Form times are `datetime-local` values and are read as UTC.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::{CouponId, Money};
use dewy_db::coupons::{Coupon, CouponInput};
use dewy_db::{CouponRepository, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{AdminPage, RequireAdmin};
use crate::routes::{Flash, non_empty, with_message};
use crate::state::AppState;

const DATETIME_LOCAL: &str = "%Y-%m-%dT%H:%M";
const DATETIME_LOCAL_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse an `<input type="datetime-local">` value as UTC.
fn parse_datetime_local(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, DATETIME_LOCAL)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DATETIME_LOCAL_SECONDS))
        .ok()
        .map(|naive| naive.and_utc())
}

fn format_datetime_local(value: DateTime<Utc>) -> String {
    value.format(DATETIME_LOCAL).to_string()
}

/// Coupon create/edit form, kept as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CouponForm {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discount_percent: String,
    #[serde(default)]
    pub max_discount_amount: String,
    #[serde(default)]
    pub min_order_amount: String,
    #[serde(default)]
    pub usage_limit: String,
    #[serde(default)]
    pub valid_from: String,
    #[serde(default)]
    pub valid_until: String,
    pub is_active: Option<String>,
}

impl CouponForm {
    /// Parse the form. Range checks (percent, window) happen in the
    /// repository so the CLI seeder gets them too.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for showing above the form.
    pub fn to_input(&self, now: DateTime<Utc>) -> std::result::Result<CouponInput, String> {
        let discount_percent = self
            .discount_percent
            .trim()
            .parse::<i32>()
            .map_err(|_| "Discount must be a whole percentage".to_string())?;

        let max_discount_amount = match non_empty(&self.max_discount_amount) {
            Some(raw) => Some(Money::parse(&raw).map_err(|e| format!("Maximum discount: {e}"))?),
            None => None,
        };

        let min_order_amount = match non_empty(&self.min_order_amount) {
            Some(raw) => Money::parse(&raw).map_err(|e| format!("Minimum order: {e}"))?,
            None => Money::ZERO,
        };

        let usage_limit = match non_empty(&self.usage_limit) {
            Some(raw) => Some(
                raw.parse::<i32>()
                    .map_err(|_| "Usage limit must be a whole number".to_string())?,
            ),
            None => None,
        };

        let valid_from = match non_empty(&self.valid_from) {
            Some(raw) => parse_datetime_local(&raw).ok_or("Valid from is not a date and time")?,
            None => now,
        };

        let valid_until = match non_empty(&self.valid_until) {
            Some(raw) => {
                Some(parse_datetime_local(&raw).ok_or("Valid until is not a date and time")?)
            }
            None => None,
        };

        Ok(CouponInput {
            code: self.code.clone(),
            description: non_empty(&self.description),
            discount_percent,
            max_discount_amount,
            min_order_amount,
            usage_limit,
            valid_from,
            valid_until,
            is_active: self.is_active.is_some(),
        })
    }
}

impl From<&Coupon> for CouponForm {
    fn from(coupon: &Coupon) -> Self {
        let rules = &coupon.rules;
        Self {
            code: coupon.code.clone(),
            description: coupon.description.clone().unwrap_or_default(),
            discount_percent: rules.discount_percent.to_string(),
            max_discount_amount: rules
                .max_discount_amount
                .map(Money::plain)
                .unwrap_or_default(),
            min_order_amount: rules.min_order_amount.plain(),
            usage_limit: rules
                .usage_limit
                .map(|limit| limit.to_string())
                .unwrap_or_default(),
            valid_from: format_datetime_local(rules.valid_from),
            valid_until: rules
                .valid_until
                .map(format_datetime_local)
                .unwrap_or_default(),
            is_active: rules.is_active.then(|| "on".to_string()),
        }
    }
}

/// Where a coupon stands right now, for the listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CouponState {
    Live,
    Scheduled,
    Expired,
    UsedUp,
    Inactive,
}

impl CouponState {
    fn of(coupon: &Coupon, now: DateTime<Utc>) -> Self {
        let rules = &coupon.rules;
        if !rules.is_active {
            Self::Inactive
        } else if rules.valid_from > now {
            Self::Scheduled
        } else if rules.valid_until.is_some_and(|until| until <= now) {
            Self::Expired
        } else if rules.usage_limit.is_some_and(|limit| rules.used_count >= limit) {
            Self::UsedUp
        } else {
            Self::Live
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Live => "Live",
            Self::Scheduled => "Scheduled",
            Self::Expired => "Expired",
            Self::UsedUp => "Used up",
            Self::Inactive => "Inactive",
        }
    }

    #[must_use]
    pub const fn badge_class(self) -> &'static str {
        match self {
            Self::Live => "success",
            Self::Scheduled => "warning",
            Self::Expired | Self::UsedUp | Self::Inactive => "",
        }
    }
}

/// Coupon listing row.
#[derive(Debug, Clone)]
pub struct CouponRow {
    pub coupon: Coupon,
    pub state: CouponState,
}

#[derive(Template, WebTemplate)]
#[template(path = "coupons/index.html")]
pub struct CouponsIndexTemplate {
    pub page: AdminPage,
    pub coupons: Vec<CouponRow>,
    pub flash: Flash,
}

#[derive(Template, WebTemplate)]
#[template(path = "coupons/form.html")]
pub struct CouponFormTemplate {
    pub page: AdminPage,
    pub coupon_id: Option<CouponId>,
    pub form: CouponForm,
    pub error: Option<String>,
}

impl CouponFormTemplate {
    #[must_use]
    pub fn action(&self) -> String {
        self.coupon_id
            .map_or_else(|| "/coupons".to_string(), |id| format!("/coupons/{id}"))
    }
}

fn rejected_form(
    page: AdminPage,
    coupon_id: Option<CouponId>,
    form: CouponForm,
    message: String,
) -> Response {
    let template = CouponFormTemplate {
        page,
        coupon_id,
        form,
        error: Some(message),
    };
    (StatusCode::UNPROCESSABLE_ENTITY, template).into_response()
}

/// List all coupons.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse> {
    let now = Utc::now();
    let coupons = CouponRepository::new(state.pool())
        .list()
        .await?
        .into_iter()
        .map(|coupon| CouponRow {
            state: CouponState::of(&coupon, now),
            coupon,
        })
        .collect();
    Ok(CouponsIndexTemplate {
        page,
        coupons,
        flash,
    })
}

/// New coupon form.
pub async fn new(page: AdminPage) -> impl IntoResponse {
    CouponFormTemplate {
        page,
        coupon_id: None,
        form: CouponForm {
            min_order_amount: Money::ZERO.plain(),
            valid_from: format_datetime_local(Utc::now()),
            is_active: Some("on".to_string()),
            ..CouponForm::default()
        },
        error: None,
    }
}

/// Create a coupon.
#[instrument(skip(state, page, form), fields(code = %form.code))]
pub async fn create(
    State(state): State<AppState>,
    page: AdminPage,
    Form(form): Form<CouponForm>,
) -> Result<Response> {
    let input = match form.to_input(Utc::now()) {
        Ok(input) => input,
        Err(message) => return Ok(rejected_form(page, None, form, message)),
    };

    match CouponRepository::new(state.pool()).create(&input).await {
        Ok(coupon) => {
            tracing::info!(coupon_id = %coupon.id, code = %coupon.code, admin = %page.admin.id, "coupon created");
            Ok(Redirect::to(&with_message("/coupons", "success", "Coupon created")).into_response())
        }
        Err(RepositoryError::Conflict(message) | RepositoryError::Validation(message)) => {
            Ok(rejected_form(page, None, form, message))
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit coupon form.
#[instrument(skip(state, page))]
pub async fn edit(
    State(state): State<AppState>,
    page: AdminPage,
    Path(id): Path<CouponId>,
) -> Result<impl IntoResponse> {
    let coupon = CouponRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon".to_string()))?;
    Ok(CouponFormTemplate {
        page,
        coupon_id: Some(id),
        form: CouponForm::from(&coupon),
        error: None,
    })
}

/// Update a coupon. The usage count is never reset from the form.
#[instrument(skip(state, page, form))]
pub async fn update(
    State(state): State<AppState>,
    page: AdminPage,
    Path(id): Path<CouponId>,
    Form(form): Form<CouponForm>,
) -> Result<Response> {
    let input = match form.to_input(Utc::now()) {
        Ok(input) => input,
        Err(message) => return Ok(rejected_form(page, Some(id), form, message)),
    };

    match CouponRepository::new(state.pool()).update(id, &input).await {
        Ok(coupon) => {
            tracing::info!(coupon_id = %coupon.id, admin = %page.admin.id, "coupon updated");
            Ok(Redirect::to(&with_message("/coupons", "success", "Coupon saved")).into_response())
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Coupon".to_string())),
        Err(RepositoryError::Conflict(message) | RepositoryError::Validation(message)) => {
            Ok(rejected_form(page, Some(id), form, message))
        }
        Err(e) => Err(e.into()),
    }
}

/// Activate or deactivate a coupon.
#[instrument(skip(state, admin))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Redirect> {
    let coupons = CouponRepository::new(state.pool());
    let coupon = coupons
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon".to_string()))?;

    let active = !coupon.rules.is_active;
    coupons.set_active(id, active).await?;
    tracing::info!(coupon_id = %id, active, admin = %admin.id, "coupon toggled");

    let message = if active {
        "Coupon activated"
    } else {
        "Coupon deactivated"
    };
    Ok(Redirect::to(&with_message("/coupons", "success", message)))
}

/// Delete a coupon. Orders keep the code they were placed with.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<Redirect> {
    match CouponRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(coupon_id = %id, admin = %admin.id, "coupon deleted");
            Ok(Redirect::to(&with_message("/coupons", "success", "Coupon deleted")))
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Coupon".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use dewy_core::coupon::CouponRules;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn form() -> CouponForm {
        CouponForm {
            code: "glow15".to_string(),
            discount_percent: "15".to_string(),
            max_discount_amount: "300".to_string(),
            min_order_amount: "999".to_string(),
            usage_limit: "100".to_string(),
            valid_from: "2026-03-01T00:00".to_string(),
            valid_until: "2026-03-31T23:59".to_string(),
            is_active: Some("on".to_string()),
            ..CouponForm::default()
        }
    }

    #[test]
    fn parses_datetime_local_as_utc() {
        assert_eq!(
            parse_datetime_local("2026-03-31T23:59"),
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 0).unwrap())
        );
        assert_eq!(
            parse_datetime_local("2026-03-31T23:59:30"),
            Some(Utc.with_ymd_and_hms(2026, 3, 31, 23, 59, 30).unwrap())
        );
        assert_eq!(parse_datetime_local("31/03/2026"), None);
    }

    #[test]
    fn full_form_parses() {
        let input = form().to_input(now()).unwrap();
        assert_eq!(input.discount_percent, 15);
        assert_eq!(input.max_discount_amount, Some(Money::from_cents(30_000)));
        assert_eq!(input.min_order_amount, Money::from_cents(99_900));
        assert_eq!(input.usage_limit, Some(100));
        assert!(input.valid_until.is_some());
        assert!(input.is_active);
    }

    #[test]
    fn optional_fields_default() {
        let input = CouponForm {
            max_discount_amount: String::new(),
            min_order_amount: String::new(),
            usage_limit: String::new(),
            valid_from: String::new(),
            valid_until: String::new(),
            ..form()
        }
        .to_input(now())
        .unwrap();
        assert_eq!(input.max_discount_amount, None);
        assert_eq!(input.min_order_amount, Money::ZERO);
        assert_eq!(input.usage_limit, None);
        assert_eq!(input.valid_from, now());
        assert_eq!(input.valid_until, None);
    }

    #[test]
    fn rejects_fractional_percent() {
        let err = CouponForm {
            discount_percent: "12.5".to_string(),
            ..form()
        }
        .to_input(now())
        .unwrap_err();
        assert_eq!(err, "Discount must be a whole percentage");
    }

    #[test]
    fn listing_state() {
        let coupon = |is_active, valid_until, used_count| Coupon {
            id: CouponId::new(1),
            code: "GLOW15".to_string(),
            description: None,
            rules: CouponRules {
                discount_percent: 15,
                max_discount_amount: None,
                min_order_amount: Money::ZERO,
                usage_limit: Some(10),
                used_count,
                valid_from: now() - chrono::Duration::days(1),
                valid_until,
                is_active,
            },
            created_at: now(),
        };
        assert_eq!(CouponState::of(&coupon(true, None, 0), now()), CouponState::Live);
        assert_eq!(CouponState::of(&coupon(false, None, 0), now()), CouponState::Inactive);
        assert_eq!(
            CouponState::of(&coupon(true, Some(now()), 0), now()),
            CouponState::Expired
        );
        assert_eq!(CouponState::of(&coupon(true, None, 10), now()), CouponState::UsedUp);
        assert_eq!(CouponState::UsedUp.label(), "Used up");
    }
}
