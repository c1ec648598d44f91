//! Order management: listing, detail and status transitions.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::{OrderId, OrderStatus};
use dewy_db::orders::{Order, OrderItem, OrderSummary, Payment, StatusHistoryEntry};
use dewy_db::users::User;
use dewy_db::{OrderRepository, Page, RepositoryError, UserRepository};
use dewy_mail::Mailer;

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{AdminPage, RequireAdmin};
use crate::routes::{Flash, non_empty, with_message};
use crate::state::AppState;

const PER_PAGE: i64 = 25;

const MAX_NOTE_LENGTH: usize = 500;

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
}

/// Status change form.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    pub status: String,
    #[serde(default)]
    pub note: String,
    /// Checkbox: email the customer.
    pub notify: Option<String>,
}

/// Parse the `?status=` filter. Unknown or empty values mean "all".
fn status_filter(raw: Option<&str>) -> Option<OrderStatus> {
    raw.filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<OrderStatus>().ok())
}

/// One `<option>` of the status filter.
#[derive(Debug, Clone, Copy)]
pub struct StatusOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/index.html")]
pub struct OrdersIndexTemplate {
    pub page: AdminPage,
    pub orders: Vec<OrderSummary>,
    pub selected_status: Option<OrderStatus>,
    pub search: String,
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl OrdersIndexTemplate {
    /// Status filter choices, with the current one marked.
    #[must_use]
    pub fn status_options(&self) -> Vec<StatusOption> {
        OrderStatus::ALL
            .into_iter()
            .map(|status| StatusOption {
                value: status.as_str(),
                label: status.label(),
                selected: self.selected_status == Some(status),
            })
            .collect()
    }

    /// Query string for another page of the same listing.
    #[must_use]
    pub fn page_link(&self, number: i64) -> String {
        let mut link = format!("/orders?page={number}");
        if let Some(status) = self.selected_status {
            link.push_str("&status=");
            link.push_str(status.as_str());
        }
        if !self.search.is_empty() {
            link.push_str("&q=");
            link.push_str(&urlencoding::encode(&self.search));
        }
        link
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "orders/show.html")]
pub struct OrderShowTemplate {
    pub page: AdminPage,
    pub order: Order,
    pub customer: Option<User>,
    pub items: Vec<OrderItem>,
    pub history: Vec<StatusHistoryEntry>,
    pub payment: Option<Payment>,
    pub next_statuses: &'static [OrderStatus],
    pub flash: Flash,
}

/// List orders, newest first.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(query): Query<OrderListQuery>,
) -> Result<impl IntoResponse> {
    let selected_status = status_filter(query.status.as_deref());
    let search = query.q.unwrap_or_default();
    let search_term = non_empty(&search);
    let paging = Page::new(query.page.unwrap_or(1), PER_PAGE);

    let orders = OrderRepository::new(state.pool());
    let total = orders.count(selected_status, search_term.as_deref()).await?;
    let rows = orders
        .list(selected_status, search_term.as_deref(), paging)
        .await?;

    Ok(OrdersIndexTemplate {
        page,
        orders: rows,
        selected_status,
        search,
        current_page: paging.number,
        total_pages: paging.page_count(total),
        total,
    })
}

/// Order detail with items, payment, history and the allowed next steps.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: AdminPage,
    Path(id): Path<OrderId>,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

    let items = orders.items(id).await?;
    let history = orders.history(id).await?;
    let payment = orders.payment_for_order(id).await?;
    let customer = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?;

    Ok(OrderShowTemplate {
        page,
        next_statuses: order.status.allowed_transitions(),
        order,
        customer,
        items,
        history,
        payment,
        flash,
    })
}

/// Move an order to a new status, record the history entry and, if asked,
/// email the customer.
#[instrument(skip(state, admin, form), fields(status = %form.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Form(form): Form<StatusForm>,
) -> Result<Redirect> {
    let order_path = format!("/orders/{id}");

    let Ok(next) = form.status.parse::<OrderStatus>() else {
        return Ok(Redirect::to(&with_message(&order_path, "error", "Unknown status")));
    };
    let note = non_empty(&form.note);
    if note.as_ref().is_some_and(|n| n.chars().count() > MAX_NOTE_LENGTH) {
        let message = format!("Note must be at most {MAX_NOTE_LENGTH} characters");
        return Ok(Redirect::to(&with_message(&order_path, "error", &message)));
    }

    let order = match OrderRepository::new(state.pool())
        .update_status(id, next, note.as_deref(), Some(admin.id))
        .await
    {
        Ok(order) => order,
        Err(RepositoryError::Validation(message)) => {
            return Ok(Redirect::to(&with_message(&order_path, "error", &message)));
        }
        Err(RepositoryError::NotFound) => return Err(AppError::NotFound("Order".to_string())),
        Err(e) => return Err(e.into()),
    };

    if form.notify.is_some() {
        notify_customer(&state, &order, note).await?;
    }

    let message = format!("Order marked {}", next.label().to_lowercase());
    Ok(Redirect::to(&with_message(&order_path, "success", &message)))
}

/// Queue the status email. Delivery failures are logged, never surfaced.
async fn notify_customer(state: &AppState, order: &Order, note: Option<String>) -> Result<()> {
    let Some(customer) = UserRepository::new(state.pool())
        .get_by_id(order.user_id)
        .await?
    else {
        tracing::warn!(order_number = %order.order_number, "order has no customer to notify");
        return Ok(());
    };

    let mailer = state.mailer().clone();
    let to = customer.email.to_string();
    let name = first_name(&customer.full_name).to_string();
    let order_number = order.order_number.clone();
    let status = order.status;
    let order_url = state.config().storefront_order_url(&order.order_number);
    Mailer::dispatch("order_status_update", async move {
        mailer
            .send_order_status_update(&to, &name, &order_number, status, note.as_deref(), &order_url)
            .await
    });
    Ok(())
}

fn first_name(full_name: &str) -> &str {
    full_name.split_whitespace().next().unwrap_or("there")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_ignores_junk() {
        assert_eq!(status_filter(Some("shipped")), Some(OrderStatus::Shipped));
        assert_eq!(status_filter(Some("")), None);
        assert_eq!(status_filter(Some("lost")), None);
        assert_eq!(status_filter(None), None);
    }

    #[test]
    fn greeting_name() {
        assert_eq!(first_name("Asha Rao"), "Asha");
        assert_eq!(first_name("   "), "there");
    }
}
