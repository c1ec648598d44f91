//! Customer list with order statistics.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use dewy_db::users::CustomerSummary;
use dewy_db::{Page, UserRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::AdminPage;
use crate::routes::non_empty;
use crate::state::AppState;

const PER_PAGE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
}

#[derive(Template, WebTemplate)]
#[template(path = "customers/index.html")]
pub struct CustomersTemplate {
    pub page: AdminPage,
    pub customers: Vec<CustomerSummary>,
    pub search: String,
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl CustomersTemplate {
    #[must_use]
    pub fn page_link(&self, number: i64) -> String {
        if self.search.is_empty() {
            format!("/customers?page={number}")
        } else {
            format!(
                "/customers?page={number}&q={}",
                urlencoding::encode(&self.search)
            )
        }
    }
}

/// List customers by sign-up date, with lifetime value.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(query): Query<CustomerQuery>,
) -> Result<impl IntoResponse> {
    let search = query.q.unwrap_or_default();
    let term = non_empty(&search);
    let paging = Page::new(query.page.unwrap_or(1), PER_PAGE);

    let users = UserRepository::new(state.pool());
    let total = users.count_customers(term.as_deref()).await?;
    let customers = users.list_customers(term.as_deref(), paging).await?;

    Ok(CustomersTemplate {
        page,
        customers,
        search,
        current_page: paging.number,
        total_pages: paging.page_count(total),
        total,
    })
}
