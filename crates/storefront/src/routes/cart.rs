//! Cart route handlers.
//!
//! Cart operations use HTMX for dynamic updates without full page reloads.
//! Without JavaScript the same forms post normally and redirect back.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::pricing::{self, OrderQuote, PricedLine};
use dewy_core::{Money, ProductId};
use dewy_db::carts::CartItem;
use dewy_db::coupons::CouponCheck;
use dewy_db::{CartRepository, CouponRepository, RepositoryError};

use crate::error::{AppError, JsonError, Result};
use crate::filters;
use crate::middleware::{OptionalAuth, PageContext};
use crate::routes::{is_htmx, with_message};
use crate::services::analytics;
use crate::services::cart::{self as cart_service, CartSummary};
use crate::state::AppState;

/// HTMX event fired after any cart change; the header badge listens for it.
const CART_UPDATED: &str = "cart-updated";

/// Add to cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub product_id: ProductId,
    pub quantity: Option<i32>,
}

/// Update cart form data.
#[derive(Debug, Deserialize)]
pub struct UpdateCartForm {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Remove from cart form data.
#[derive(Debug, Deserialize)]
pub struct RemoveFromCartForm {
    pub product_id: ProductId,
}

/// Coupon preview request.
#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    #[serde(default)]
    pub code: String,
}

/// Coupon preview response.
#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub valid: bool,
    pub code: Option<String>,
    pub message: String,
    pub quote: OrderQuote,
}

/// Cart page template.
#[derive(Template, WebTemplate)]
#[template(path = "cart/show.html")]
pub struct CartShowTemplate {
    pub page: PageContext,
    pub cart: CartSummary,
    pub error: Option<String>,
}

/// Cart items fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_items.html")]
pub struct CartItemsTemplate {
    pub cart: CartSummary,
    pub error: Option<String>,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: i64,
}

/// Inline message fragment, swapped into the product page's message slot.
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_message.html")]
pub struct CartMessageTemplate {
    pub message: String,
    pub is_error: bool,
}

/// Query parameters for the cart page.
#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub error: Option<String>,
}

/// Display cart page.
#[instrument(skip(state, session, page))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    Query(query): Query<CartQuery>,
) -> Result<impl IntoResponse> {
    let cart = cart_service::summarize(state.pool(), &session, page.user.as_ref(), Utc::now()).await?;
    Ok(CartShowTemplate {
        page,
        cart,
        error: query.error,
    })
}

/// Refreshed cart fragment after a change.
async fn items_fragment(
    state: &AppState,
    session: &Session,
    auth: &OptionalAuth,
    error: Option<String>,
) -> Result<Response> {
    let cart = cart_service::summarize(state.pool(), session, auth.0.as_ref(), Utc::now()).await?;
    Ok((
        AppendHeaders([("HX-Trigger", CART_UPDATED)]),
        CartItemsTemplate { cart, error },
    )
        .into_response())
}

/// Add item to cart.
///
/// HTMX requests get the new count badge and a `cart-updated` trigger.
/// Stock and quantity problems are swapped into `#cart-message` instead.
#[instrument(skip(state, session, auth, headers))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<AddToCartForm>,
) -> Result<Response> {
    let quantity = form.quantity.unwrap_or(1);
    let cart_id = cart_service::ensure_cart(state.pool(), &session, auth.0.as_ref()).await?;
    let carts = CartRepository::new(state.pool());

    match carts.add_item(cart_id, form.product_id, quantity).await {
        Ok(new_quantity) => {
            analytics::track(
                state.pool(),
                analytics::event(
                    "add_to_cart",
                    &session,
                    auth.0.as_ref().map(|u| u.id),
                    Some(form.product_id),
                    None,
                    json!({ "quantity": quantity, "line_quantity": new_quantity }),
                ),
            );
            if !is_htmx(&headers) {
                return Ok(Redirect::to("/cart").into_response());
            }
            let count = carts.item_count(cart_id).await?;
            Ok((
                AppendHeaders([("HX-Trigger", CART_UPDATED)]),
                CartCountTemplate { count },
            )
                .into_response())
        }
        Err(RepositoryError::Validation(message)) => {
            if !is_htmx(&headers) {
                return Ok(Redirect::to(&with_message("/cart", "error", &message)).into_response());
            }
            Ok((
                AppendHeaders([("HX-Retarget", "#cart-message"), ("HX-Reswap", "innerHTML")]),
                CartMessageTemplate {
                    message,
                    is_error: true,
                },
            )
                .into_response())
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Product".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Update cart item quantity. Zero removes the line.
#[instrument(skip(state, session, auth, headers))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<UpdateCartForm>,
) -> Result<Response> {
    let mut error = None;
    if let Some(cart_id) = cart_service::find_cart(state.pool(), &session, auth.0.as_ref()).await? {
        match CartRepository::new(state.pool())
            .set_quantity(cart_id, form.product_id, form.quantity)
            .await
        {
            Ok(()) | Err(RepositoryError::NotFound) => {}
            Err(RepositoryError::Validation(message)) => error = Some(message),
            Err(e) => return Err(e.into()),
        }
    }

    if !is_htmx(&headers) {
        let target = error.map_or_else(|| "/cart".to_string(), |m| with_message("/cart", "error", &m));
        return Ok(Redirect::to(&target).into_response());
    }
    items_fragment(&state, &session, &auth, error).await
}

/// Remove item from cart.
#[instrument(skip(state, session, auth, headers))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    headers: HeaderMap,
    Form(form): Form<RemoveFromCartForm>,
) -> Result<Response> {
    if let Some(cart_id) = cart_service::find_cart(state.pool(), &session, auth.0.as_ref()).await? {
        CartRepository::new(state.pool())
            .remove_item(cart_id, form.product_id)
            .await?;
        analytics::track(
            state.pool(),
            analytics::event(
                "remove_from_cart",
                &session,
                auth.0.as_ref().map(|u| u.id),
                Some(form.product_id),
                None,
                json!({}),
            ),
        );
    }

    if !is_htmx(&headers) {
        return Ok(Redirect::to("/cart").into_response());
    }
    items_fragment(&state, &session, &auth, None).await
}

/// Get cart count badge (HTMX).
#[instrument(skip(state, session, auth))]
pub async fn count(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
) -> Result<impl IntoResponse> {
    let count = cart_service::item_count(state.pool(), &session, auth.0.as_ref()).await?;
    Ok(CartCountTemplate { count })
}

/// Preview a coupon against the current cart.
///
/// An accepted code is remembered in the session and prefilled at checkout;
/// an empty code clears it. Rejections are a normal response with
/// `valid: false`, not an error.
#[instrument(skip(state, session, auth))]
pub async fn coupon(
    State(state): State<AppState>,
    session: Session,
    auth: OptionalAuth,
    Json(request): Json<CouponRequest>,
) -> std::result::Result<Json<CouponPreview>, JsonError> {
    let items: Vec<CartItem> =
        match cart_service::find_cart(state.pool(), &session, auth.0.as_ref()).await? {
            Some(cart_id) => CartRepository::new(state.pool()).lines(cart_id).await?,
            None => Vec::new(),
        };
    let priced: Vec<PricedLine> = items.iter().map(CartItem::priced).collect();

    let code = request.code.trim();
    if code.is_empty() {
        cart_service::remember_coupon(&session, None).await?;
        return Ok(Json(CouponPreview {
            valid: false,
            code: None,
            message: "Coupon removed".to_string(),
            quote: pricing::quote(&priced, Money::ZERO),
        }));
    }
    if priced.is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".to_string()).into());
    }

    let check = CouponRepository::new(state.pool())
        .check(code, pricing::subtotal(&priced), Utc::now())
        .await?;
    let preview = match check {
        CouponCheck::Applied { coupon, discount } => {
            cart_service::remember_coupon(&session, Some(&coupon.code)).await?;
            CouponPreview {
                valid: true,
                message: format!("{} applied: you save {discount}", coupon.code),
                code: Some(coupon.code),
                quote: pricing::quote(&priced, discount),
            }
        }
        CouponCheck::Rejected(rejection) => CouponPreview {
            valid: false,
            code: None,
            message: rejection.to_string(),
            quote: pricing::quote(&priced, Money::ZERO),
        },
    };
    Ok(Json(preview))
}
