//! Checkout route handlers.
//!
//! Placement runs in one database transaction (see
//! `OrderRepository::place_order`). Email and analytics happen after the
//! commit and never affect the response.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use dewy_core::{AddressId, PaymentMethod};
use dewy_db::addresses::Address;
use dewy_db::orders::PlaceOrder;
use dewy_db::{AddressRepository, OrderRepository, RepositoryError};
use dewy_mail::{Mailer, OrderEmail};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::routes::with_message;
use crate::services::analytics;
use crate::services::cart::{self as cart_service, CartSummary};
use crate::state::AppState;

/// Checkout form data.
#[derive(Debug, Deserialize)]
pub struct CheckoutForm {
    pub address_id: AddressId,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutQuery {
    pub error: Option<String>,
}

/// Checkout page template.
#[derive(Template, WebTemplate)]
#[template(path = "checkout/show.html")]
pub struct CheckoutTemplate {
    pub page: PageContext,
    pub cart: CartSummary,
    pub addresses: Vec<Address>,
    pub error: Option<String>,
}

/// Display the checkout page.
#[instrument(skip(state, session, page, user))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    Query(query): Query<CheckoutQuery>,
) -> Result<Response> {
    let cart = cart_service::summarize(state.pool(), &session, Some(&user), Utc::now()).await?;
    if cart.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }
    let addresses = AddressRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;

    analytics::track(
        state.pool(),
        analytics::event(
            "checkout_started",
            &session,
            Some(user.id),
            None,
            Some("/checkout"),
            json!({ "items": cart.item_count(), "subtotal": cart.quote.subtotal.plain() }),
        ),
    );

    Ok(CheckoutTemplate {
        page,
        cart,
        addresses,
        error: query.error,
    }
    .into_response())
}

/// Place the order.
///
/// Business rejections (empty cart, stock, coupon, unknown address) send the
/// shopper back to checkout with the reason; anything else is a server error.
#[instrument(skip(state, session, user, form), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<CheckoutForm>,
) -> Result<Response> {
    let coupon_code = form
        .coupon_code
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let request = PlaceOrder {
        user_id: user.id,
        address_id: form.address_id,
        coupon_code,
        payment_method: form.payment_method,
        now: Utc::now(),
    };

    let placed = match OrderRepository::new(state.pool()).place_order(&request).await {
        Ok(placed) => placed,
        Err(RepositoryError::Validation(message)) => {
            return Ok(Redirect::to(&with_message("/checkout", "error", &message)).into_response());
        }
        Err(RepositoryError::NotFound) => {
            return Ok(Redirect::to(&with_message(
                "/checkout",
                "error",
                "Please choose one of your saved addresses",
            ))
            .into_response());
        }
        Err(e) => return Err(AppError::from(e)),
    };

    let order = &placed.order;
    add_breadcrumb(
        "checkout",
        "order placed",
        Some(&[("order_number", order.order_number.as_str())]),
    );
    cart_service::remember_coupon(&session, None).await?;

    let order_path = format!("/orders/{}", order.order_number);
    let email = OrderEmail::new(
        order,
        &placed.items,
        placed.payment.method,
        state.config().url(&order_path),
    );

    let mailer = state.mailer().clone();
    let to = user.email.to_string();
    let confirmation = email.clone();
    Mailer::dispatch("order_confirmation", async move {
        mailer.send_order_confirmation(&to, &confirmation).await
    });

    let mailer = state.mailer().clone();
    let customer_email = user.email.to_string();
    let admin_url = state.config().admin_base_url.as_deref().map_or_else(
        String::new,
        |base| format!("{}/orders/{}", base.trim_end_matches('/'), order.id),
    );
    Mailer::dispatch("admin_new_order", async move {
        mailer
            .send_admin_new_order(&email, &customer_email, &admin_url)
            .await
    });

    analytics::track(
        state.pool(),
        analytics::event(
            "purchase",
            &session,
            Some(user.id),
            None,
            Some("/checkout"),
            json!({
                "order_number": order.order_number,
                "total": order.total.plain(),
                "items": placed.items.len(),
                "coupon": order.coupon_code,
            }),
        ),
    );

    Ok(Redirect::to(&format!("{order_path}?placed=1")).into_response())
}
