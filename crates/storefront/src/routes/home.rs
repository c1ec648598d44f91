//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tracing::instrument;

use dewy_db::categories::CategoryWithCount;
use dewy_db::products::{Product, ProductFilter, ProductSort};
use dewy_db::{CategoryRepository, Page, ProductRepository};

use crate::error::Result;
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Products shown in the "new arrivals" strip.
const FEATURED_COUNT: i64 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub page: PageContext,
    pub featured: Vec<Product>,
    pub categories: Vec<CategoryWithCount>,
}

/// Display the home page.
#[instrument(skip(state, page))]
pub async fn home(State(state): State<AppState>, page: PageContext) -> Result<impl IntoResponse> {
    let filter = ProductFilter {
        sort: ProductSort::Newest,
        ..ProductFilter::default()
    };
    let featured = ProductRepository::new(state.pool())
        .list(&filter, Page::new(1, FEATURED_COUNT))
        .await?;
    let categories = CategoryRepository::new(state.pool())
        .list()
        .await?
        .into_iter()
        .filter(|c| c.product_count > 0)
        .collect();

    Ok(HomeTemplate {
        page,
        featured,
        categories,
    })
}
