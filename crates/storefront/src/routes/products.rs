//! Catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::cart::MAX_LINE_QUANTITY;
use dewy_db::categories::{Category, CategoryWithCount};
use dewy_db::products::{Product, ProductFilter, ProductSort};
use dewy_db::{CategoryRepository, Page, ProductRepository, WishlistRepository};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::PageContext;
use crate::state::AppState;

/// Products per listing page.
pub const PER_PAGE: i64 = 12;

const RELATED_COUNT: i64 = 4;

/// Query parameters for listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListingQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub sort: Option<ProductSort>,
    pub page: Option<i64>,
}

impl ListingQuery {
    fn search(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(String::from)
    }
}

/// A numbered pagination link.
#[derive(Debug, Clone)]
pub struct PageLink {
    pub number: i64,
    pub href: String,
    pub current: bool,
}

/// Product listing template (all products, a category or a search).
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: PageContext,
    pub products: Vec<Product>,
    pub categories: Vec<CategoryWithCount>,
    pub category: Option<Category>,
    pub search: String,
    pub sort: ProductSort,
    pub total: i64,
    pub pages: Vec<PageLink>,
}

impl ProductsIndexTemplate {
    /// Whether `sort` is the selected option.
    #[must_use]
    pub fn sorted_by(&self, sort: &str) -> bool {
        self.sort.as_str() == sort
    }
}

/// Product detail template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub page: PageContext,
    pub product: Product,
    pub related: Vec<Product>,
    pub wishlisted: bool,
    /// Quantities offered in the picker.
    pub quantities: Vec<i32>,
}

/// Build pagination links that keep the other listing parameters.
fn page_links(
    base: &str,
    query: &ListingQuery,
    search: Option<&str>,
    current: i64,
    count: i64,
) -> Vec<PageLink> {
    if count <= 1 {
        return Vec::new();
    }
    (1..=count)
        .map(|number| {
            let mut params = vec![format!("page={number}")];
            if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
                params.push(format!("category={}", urlencoding::encode(category)));
            }
            if let Some(q) = search {
                params.push(format!("q={}", urlencoding::encode(q)));
            }
            if let Some(sort) = query.sort {
                params.push(format!("sort={}", sort.as_str()));
            }
            PageLink {
                number,
                href: format!("{base}?{}", params.join("&")),
                current: number == current,
            }
        })
        .collect()
}

async fn render_listing(
    state: &AppState,
    page: PageContext,
    base: &str,
    query: &ListingQuery,
    category: Option<Category>,
) -> Result<ProductsIndexTemplate> {
    let search = query.search();
    let filter = ProductFilter {
        category_slug: category.as_ref().map(|c| c.slug.clone()),
        search: search.clone(),
        sort: query.sort.unwrap_or_default(),
        include_inactive: false,
    };
    let listing = Page::new(query.page.unwrap_or(1), PER_PAGE);

    let products_repo = ProductRepository::new(state.pool());
    let products = products_repo.list(&filter, listing).await?;
    let total = products_repo.count(&filter).await?;
    let categories = CategoryRepository::new(state.pool()).list().await?;

    Ok(ProductsIndexTemplate {
        page,
        products,
        categories,
        category,
        pages: page_links(
            base,
            query,
            search.as_deref(),
            listing.number,
            listing.page_count(total),
        ),
        search: search.unwrap_or_default(),
        sort: filter.sort,
        total,
    })
}

/// Display the product listing.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: PageContext,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let category = match query.category.as_deref().filter(|c| !c.is_empty()) {
        Some(slug) => Some(
            CategoryRepository::new(state.pool())
                .get_by_slug(slug)
                .await?
                .ok_or_else(|| AppError::NotFound("Category".to_string()))?,
        ),
        None => None,
    };
    render_listing(&state, page, "/products", &query, category).await
}

/// Display one category's products.
#[instrument(skip(state, page))]
pub async fn category(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
    Query(query): Query<ListingQuery>,
) -> Result<impl IntoResponse> {
    let category = CategoryRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound("Category".to_string()))?;
    let query = ListingQuery {
        category: None,
        ..query
    };
    let base = format!("/categories/{}", category.slug);
    render_listing(&state, page, &base, &query, Some(category)).await
}

/// Display product details.
#[instrument(skip(state, page))]
pub async fn show(
    State(state): State<AppState>,
    page: PageContext,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let products = ProductRepository::new(state.pool());
    let product = products
        .get_by_slug(&slug)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let related = products.related(&product, RELATED_COUNT).await?;
    let wishlisted = match &page.user {
        Some(user) => {
            WishlistRepository::new(state.pool())
                .contains(user.id, product.id)
                .await?
        }
        None => false,
    };
    let quantities = (1..=product.stock.min(MAX_LINE_QUANTITY)).collect();

    Ok(ProductShowTemplate {
        page,
        product,
        related,
        wishlisted,
        quantities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page_has_no_links() {
        assert!(page_links("/products", &ListingQuery::default(), None, 1, 1).is_empty());
    }

    #[test]
    fn links_keep_filters() {
        let query = ListingQuery {
            category: Some("serums".to_string()),
            q: Some("vitamin c".to_string()),
            sort: Some(ProductSort::PriceAsc),
            page: Some(2),
        };
        let links = page_links("/products", &query, Some("vitamin c"), 2, 3);
        assert_eq!(links.len(), 3);
        assert!(links[1].current);
        assert_eq!(
            links[0].href,
            "/products?page=1&category=serums&q=vitamin%20c&sort=price_asc"
        );
    }
}
