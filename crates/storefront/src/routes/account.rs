//! Account route handlers: profile and saved addresses.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::AddressId;
use dewy_db::addresses::{Address, AddressInput, MAX_ADDRESSES_PER_USER};
use dewy_db::users::{ProfileUpdate, User};
use dewy_db::{AddressRepository, RepositoryError, UserRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth, safe_next};
use crate::models::{CurrentUser, session_keys};
use crate::routes::with_message;
use crate::state::AppState;

const MAX_NAME_LENGTH: usize = 100;
const MAX_PHONE_LENGTH: usize = 20;

/// Query parameters for error/success display.
#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    pub error: Option<String>,
    pub success: Option<String>,
    pub next: Option<String>,
}

/// Profile form data.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub full_name: String,
    pub phone: Option<String>,
}

/// Address form data.
#[derive(Debug, Deserialize)]
pub struct AddressForm {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    /// Where to go after saving (checkout sends shoppers here).
    pub next: Option<String>,
}

impl AddressForm {
    fn input(&self) -> AddressInput {
        AddressInput {
            full_name: self.full_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            line1: self.line1.trim().to_string(),
            line2: self
                .line2
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
        }
    }
}

/// Account overview template.
#[derive(Template, WebTemplate)]
#[template(path = "account/show.html")]
pub struct AccountTemplate {
    pub page: PageContext,
    pub user: User,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Address book template.
#[derive(Template, WebTemplate)]
#[template(path = "account/addresses.html")]
pub struct AddressesTemplate {
    pub page: PageContext,
    pub addresses: Vec<Address>,
    pub can_add: bool,
    pub max_addresses: usize,
    pub next: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Display the account page.
#[instrument(skip(state, page, current))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(current): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let user = UserRepository::new(state.pool())
        .get_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Account".to_string()))?;
    Ok(AccountTemplate {
        page,
        user,
        error: query.error,
        success: query.success,
    })
}

fn validate_profile(form: &ProfileForm) -> std::result::Result<ProfileUpdate, String> {
    let full_name = form.full_name.trim();
    if full_name.is_empty() {
        return Err("Name is required".to_string());
    }
    if full_name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!("Name must be at most {MAX_NAME_LENGTH} characters"));
    }
    let phone = form
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    if let Some(phone) = phone
        && (phone.len() > MAX_PHONE_LENGTH
            || !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')))
    {
        return Err("Please enter a valid phone number".to_string());
    }
    Ok(ProfileUpdate {
        full_name: full_name.to_string(),
        phone: phone.map(String::from),
    })
}

/// Update name and phone.
#[instrument(skip(state, session, current, form))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(current): RequireAuth,
    Form(form): Form<ProfileForm>,
) -> Result<Response> {
    let update = match validate_profile(&form) {
        Ok(update) => update,
        Err(message) => {
            return Ok(Redirect::to(&with_message("/account", "error", &message)).into_response());
        }
    };

    let user = UserRepository::new(state.pool())
        .update_profile(current.id, &update)
        .await?;
    // Keep the header greeting in step without cycling the session id.
    session
        .insert(session_keys::CURRENT_USER, CurrentUser::from(&user))
        .await?;

    Ok(Redirect::to(&with_message("/account", "success", "Profile updated")).into_response())
}

/// Display saved addresses.
#[instrument(skip(state, page, user))]
pub async fn addresses(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    Query(query): Query<MessageQuery>,
) -> Result<impl IntoResponse> {
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(AddressesTemplate {
        page,
        can_add: addresses.len() < MAX_ADDRESSES_PER_USER as usize,
        addresses,
        max_addresses: MAX_ADDRESSES_PER_USER as usize,
        next: query.next.filter(|n| safe_next(Some(n.as_str())) == n.as_str()),
        error: query.error,
        success: query.success,
    })
}

/// Where to land after an address change.
fn address_target(next: Option<&str>, key: &str, message: &str) -> String {
    match next {
        Some(next) if safe_next(Some(next)) != "/" => next.to_string(),
        _ => with_message("/account/addresses", key, message),
    }
}

fn address_error(message: &str, next: Option<&str>) -> Response {
    let mut target = with_message("/account/addresses", "error", message);
    if let Some(next) = next.filter(|n| safe_next(Some(n)) != "/") {
        target.push_str("&next=");
        target.push_str(&urlencoding::encode(next));
    }
    Redirect::to(&target).into_response()
}

/// Save a new address. At most two per customer.
#[instrument(skip(state, user, form))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<AddressForm>,
) -> Result<Response> {
    match AddressRepository::new(state.pool())
        .create(user.id, &form.input())
        .await
    {
        Ok(_) => Ok(Redirect::to(&address_target(form.next.as_deref(), "success", "Address saved"))
            .into_response()),
        Err(RepositoryError::Validation(message)) => Ok(address_error(&message, form.next.as_deref())),
        Err(e) => Err(e.into()),
    }
}

/// Edit an address.
#[instrument(skip(state, user, form))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Form(form): Form<AddressForm>,
) -> Result<Response> {
    match AddressRepository::new(state.pool())
        .update(user.id, id, &form.input())
        .await
    {
        Ok(_) => Ok(Redirect::to(&address_target(form.next.as_deref(), "success", "Address updated"))
            .into_response()),
        Err(RepositoryError::Validation(message)) => Ok(address_error(&message, form.next.as_deref())),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Address".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Delete an address. The default moves to the remaining one.
#[instrument(skip(state, user))]
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Response> {
    match AddressRepository::new(state.pool()).delete(user.id, id).await {
        Ok(()) => Ok(Redirect::to(&with_message(
            "/account/addresses",
            "success",
            "Address removed",
        ))
        .into_response()),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Address".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Make an address the default for checkout.
#[instrument(skip(state, user))]
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Response> {
    match AddressRepository::new(state.pool())
        .set_default(user.id, id)
        .await
    {
        Ok(()) => Ok(Redirect::to(&with_message(
            "/account/addresses",
            "success",
            "Default address updated",
        ))
        .into_response()),
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Address".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn profile(name: &str, phone: Option<&str>) -> ProfileForm {
        ProfileForm {
            full_name: name.to_string(),
            phone: phone.map(String::from),
        }
    }

    #[test]
    fn profile_validation() {
        assert!(validate_profile(&profile("  ", None)).is_err());
        assert!(validate_profile(&profile("Mira", Some("call me"))).is_err());

        let update = validate_profile(&profile(" Mira Shah ", Some(" +91 98765-43210 "))).unwrap();
        assert_eq!(update.full_name, "Mira Shah");
        assert_eq!(update.phone.as_deref(), Some("+91 98765-43210"));

        let update = validate_profile(&profile("Mira", Some(""))).unwrap();
        assert_eq!(update.phone, None);
    }

    #[test]
    fn address_target_prefers_safe_next() {
        assert_eq!(address_target(Some("/checkout"), "success", "Saved"), "/checkout");
        assert_eq!(
            address_target(Some("https://evil.example"), "success", "Saved"),
            "/account/addresses?success=Saved"
        );
        assert_eq!(
            address_target(None, "success", "Address saved"),
            "/account/addresses?success=Address%20saved"
        );
    }
}
