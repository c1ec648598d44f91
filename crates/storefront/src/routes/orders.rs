//! Order history route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::OrderStatus;
use dewy_db::orders::{Order, OrderItem, Payment, StatusHistoryEntry};
use dewy_db::{OrderRepository, RepositoryError};
use dewy_mail::Mailer;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{PageContext, RequireAuth};
use crate::routes::with_message;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderQuery {
    pub placed: Option<u8>,
    pub error: Option<String>,
    pub success: Option<String>,
}

/// Order history template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: PageContext,
    pub orders: Vec<Order>,
}

/// One step of the order timeline.
#[derive(Debug, Clone, Copy)]
pub struct TimelineStep {
    pub label: &'static str,
    pub reached: bool,
}

/// Order detail template.
#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: PageContext,
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusHistoryEntry>,
    pub payment: Option<Payment>,
    pub just_placed: bool,
    pub can_cancel: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl OrderShowTemplate {
    /// Progress steps for the timeline, ignoring cancellation.
    #[must_use]
    pub fn steps(&self) -> Vec<TimelineStep> {
        const STEPS: [OrderStatus; 5] = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ];
        let reached = STEPS
            .iter()
            .position(|s| *s == self.order.status)
            .unwrap_or(0);
        STEPS
            .iter()
            .enumerate()
            .map(|(i, s)| TimelineStep {
                label: s.label(),
                reached: i <= reached,
            })
            .collect()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.order.status == OrderStatus::Cancelled
    }
}

/// Display the customer's orders.
#[instrument(skip(state, page, user))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(OrdersIndexTemplate { page, orders })
}

/// Display one order with its status timeline.
#[instrument(skip(state, page, user))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_for_user(user.id, &number)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let items = orders.items(order.id).await?;
    let history = orders.history(order.id).await?;
    let payment = orders.payment_for_order(order.id).await?;

    Ok(OrderShowTemplate {
        page,
        can_cancel: order.status.customer_cancellable(),
        order,
        items,
        history,
        payment,
        just_placed: query.placed.is_some(),
        error: query.error,
        success: query.success,
    })
}

/// Cancel an order that has not started processing.
#[instrument(skip(state, user))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(number): Path<String>,
) -> Result<Response> {
    let order_path = format!("/orders/{number}");
    let order = match OrderRepository::new(state.pool())
        .cancel_for_user(user.id, &number)
        .await
    {
        Ok(order) => order,
        Err(RepositoryError::Validation(message)) => {
            return Ok(Redirect::to(&with_message(&order_path, "error", &message)).into_response());
        }
        Err(RepositoryError::NotFound) => return Err(AppError::NotFound("Order".to_string())),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(order_number = %order.order_number, "order cancelled by customer");

    let mailer = state.mailer().clone();
    let to = user.email.to_string();
    let name = user.first_name().to_string();
    let order_url = state.config().url(&order_path);
    Mailer::dispatch("order_status_update", async move {
        mailer
            .send_order_status_update(
                &to,
                &name,
                &order.order_number,
                OrderStatus::Cancelled,
                None,
                &order_url,
            )
            .await
    });

    Ok(Redirect::to(&with_message(&order_path, "success", "Your order has been cancelled")).into_response())
}
