//! Dashboard: the last 30 days at a glance.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use tracing::instrument;

use dewy_db::analytics::SalesSummary;
use dewy_db::orders::OrderSummary;
use dewy_db::products::Product;
use dewy_db::{AnalyticsRepository, OrderRepository, ProductRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::AdminPage;
use crate::state::AppState;

const SUMMARY_DAYS: i64 = 30;

/// Products at or below this stock level are flagged.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

const LIST_LIMIT: i64 = 10;

/// Dashboard template.
#[derive(Template, WebTemplate)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub page: AdminPage,
    pub summary: SalesSummary,
    pub low_stock: Vec<Product>,
    pub recent_orders: Vec<OrderSummary>,
    pub low_stock_threshold: i32,
}

/// Display the dashboard.
#[instrument(skip(state, page))]
pub async fn index(State(state): State<AppState>, page: AdminPage) -> Result<impl IntoResponse> {
    let since = Utc::now() - Duration::days(SUMMARY_DAYS);

    let summary = AnalyticsRepository::new(state.pool()).summary(since).await?;
    let low_stock = ProductRepository::new(state.pool())
        .low_stock(LOW_STOCK_THRESHOLD, LIST_LIMIT)
        .await?;
    let recent_orders = OrderRepository::new(state.pool()).recent(LIST_LIMIT).await?;

    Ok(DashboardTemplate {
        page,
        summary,
        low_stock,
        recent_orders,
        low_stock_threshold: LOW_STOCK_THRESHOLD,
    })
}
