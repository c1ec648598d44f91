//! Wishlist route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::ProductId;
use dewy_db::wishlist::WishlistEntry;
use dewy_db::{ProductRepository, WishlistRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::routes::is_htmx;
use crate::services::analytics;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub product_id: ProductId,
}

/// Wishlist page template.
#[derive(Template, WebTemplate)]
#[template(path = "wishlist/index.html")]
pub struct WishlistTemplate {
    pub page: PageContext,
    pub entries: Vec<WishlistEntry>,
}

/// Heart button fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/wishlist_button.html")]
pub struct WishlistButtonTemplate {
    pub product_id: ProductId,
    pub wishlisted: bool,
}

/// Display the wishlist.
#[instrument(skip(state, page, user))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let entries = WishlistRepository::new(state.pool()).list(user.id).await?;
    Ok(WishlistTemplate { page, entries })
}

/// Add or remove a product. Returns the updated button for HTMX.
#[instrument(skip(state, session, user, headers))]
pub async fn toggle(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Form(form): Form<ToggleForm>,
) -> Result<Response> {
    if ProductRepository::new(state.pool())
        .get_by_id(form.product_id)
        .await?
        .is_none()
    {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let wishlisted = WishlistRepository::new(state.pool())
        .toggle(user.id, form.product_id)
        .await?;

    if wishlisted {
        analytics::track(
            state.pool(),
            analytics::event(
                "wishlist_add",
                &session,
                Some(user.id),
                Some(form.product_id),
                None,
                json!({}),
            ),
        );
    }

    if !is_htmx(&headers) {
        return Ok(Redirect::to("/wishlist").into_response());
    }
    Ok(WishlistButtonTemplate {
        product_id: form.product_id,
        wishlisted,
    }
    .into_response())
}
