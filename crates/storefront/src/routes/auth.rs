//! Authentication route handlers.
//!
//! Password login and registration. Signing in folds the visitor's anonymous
//! cart into their account cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::UserId;
use dewy_mail::Mailer;

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{PageContext, clear_current_user, safe_next, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::{AuthError, AuthService};
use crate::services::cart as cart_service;
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub next: Option<String>,
}

/// Registration form data.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub next: Option<String>,
}

/// Query parameters for the auth pages.
#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub next: Option<String>,
    pub error: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub page: PageContext,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub page: PageContext,
    pub full_name: String,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
}

/// Message shown for an auth failure. Unexpected failures become `Err`.
fn auth_failure(err: AuthError) -> Result<(StatusCode, String)> {
    let err = AppError::from(err);
    let status = err.status();
    if status.is_server_error() {
        return Err(err);
    }
    Ok((status, err.public_message()))
}

/// Sign the user in and carry their anonymous cart over.
async fn start_session(state: &AppState, session: &Session, user: &CurrentUser) -> Result<()> {
    if let Err(e) = cart_service::merge_on_login(state.pool(), session, user.id).await {
        // Keep the login working; the anonymous cart stays in the session.
        tracing::warn!(user_id = %user.id, error = %e, "cart merge failed");
    }
    set_current_user(session, user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(page: PageContext, Query(query): Query<AuthQuery>) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    if page.is_signed_in() {
        return Redirect::to(&next).into_response();
    }
    LoginTemplate {
        page,
        email: String::new(),
        next,
        error: query.error,
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, page, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();

    let user = match AuthService::new(state.pool())
        .login_with_password(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            let (status, message) = auth_failure(e)?;
            tracing::info!(status = status.as_u16(), "login rejected");
            let template = LoginTemplate {
                page,
                email: form.email,
                next,
                error: Some(message),
            };
            return Ok((status, template).into_response());
        }
    };

    let current = CurrentUser::from(&user);
    start_session(&state, &session, &current).await?;
    tracing::info!(user_id = %user.id, "customer signed in");

    Ok(Redirect::to(&next).into_response())
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(page: PageContext, Query(query): Query<AuthQuery>) -> Response {
    let next = safe_next(query.next.as_deref()).to_string();
    if page.is_signed_in() {
        return Redirect::to(&next).into_response();
    }
    RegisterTemplate {
        page,
        full_name: String::new(),
        email: String::new(),
        next,
        error: query.error,
    }
    .into_response()
}

/// Handle registration form submission.
///
/// New accounts are signed in straight away and sent a welcome email.
#[instrument(skip(state, session, page, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let next = safe_next(form.next.as_deref()).to_string();
    let rejected = |page: PageContext, form: &RegisterForm, status: StatusCode, message: String| {
        (
            status,
            RegisterTemplate {
                page,
                full_name: form.full_name.clone(),
                email: form.email.clone(),
                next: next.clone(),
                error: Some(message),
            },
        )
            .into_response()
    };

    if form.password != form.password_confirm {
        return Ok(rejected(
            page,
            &form,
            StatusCode::BAD_REQUEST,
            "Passwords do not match".to_string(),
        ));
    }

    let user = match AuthService::new(state.pool())
        .register_with_password(&form.email, &form.full_name, &form.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            let (status, message) = auth_failure(e)?;
            return Ok(rejected(page, &form, status, message));
        }
    };

    let current = CurrentUser::from(&user);
    start_session(&state, &session, &current).await?;
    tracing::info!(user_id = %user.id, "customer registered");

    send_welcome(&state, user.id, &current);

    Ok(Redirect::to(&next).into_response())
}

fn send_welcome(state: &AppState, user_id: UserId, user: &CurrentUser) {
    let mailer = state.mailer().clone();
    let to = user.email.to_string();
    let name = user.first_name().to_string();
    let shop_url = state.config().url("/");
    tracing::debug!(user_id = %user_id, "queueing welcome email");
    Mailer::dispatch("welcome", async move {
        mailer.send_welcome(&to, &name, &shop_url).await
    });
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(Redirect::to("/"))
}
