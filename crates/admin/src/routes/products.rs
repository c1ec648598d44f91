//! Product management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::{CategoryId, Money, ProductId};
use dewy_db::categories::{CategoryWithCount, slugify};
use dewy_db::products::{Product, ProductFilter, ProductInput};
use dewy_db::{CategoryRepository, Page, ProductRepository, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{AdminPage, RequireAdmin};
use crate::routes::{Flash, non_empty, with_message};
use crate::state::AppState;

const PER_PAGE: i64 = 25;

const MAX_STOCK: i32 = 1_000_000;

/// Listing query parameters.
#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Product create/edit form. Kept as strings so a rejected form can be
/// re-rendered exactly as typed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub category_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub compare_at_price: String,
    #[serde(default)]
    pub stock: String,
    #[serde(default)]
    pub image_url: String,
    /// Checkbox: present when ticked.
    pub is_active: Option<String>,
}

impl ProductForm {
    /// Validate and convert to repository input. The slug defaults to one
    /// derived from the name.
    ///
    /// # Errors
    ///
    /// Returns a message suitable for showing above the form.
    pub fn to_input(&self) -> std::result::Result<ProductInput, String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Name is required".to_string());
        }

        let slug = slugify(if self.slug.trim().is_empty() {
            name
        } else {
            &self.slug
        });
        if slug.is_empty() {
            return Err("Slug must contain letters or digits".to_string());
        }

        let category_id = match non_empty(&self.category_id) {
            Some(raw) => Some(
                raw.parse::<CategoryId>()
                    .map_err(|_| "Unknown category".to_string())?,
            ),
            None => None,
        };

        let price = Money::parse(&self.price).map_err(|e| format!("Price: {e}"))?;
        if price.is_zero() {
            return Err("Price must be greater than zero".to_string());
        }

        let compare_at_price = match non_empty(&self.compare_at_price) {
            Some(raw) => Some(Money::parse(&raw).map_err(|e| format!("Compare-at price: {e}"))?),
            None => None,
        };

        let stock = match non_empty(&self.stock) {
            Some(raw) => raw
                .parse::<i32>()
                .ok()
                .filter(|s| (0..=MAX_STOCK).contains(s))
                .ok_or_else(|| format!("Stock must be a whole number from 0 to {MAX_STOCK}"))?,
            None => 0,
        };

        let image_url = non_empty(&self.image_url);
        if let Some(url) = &image_url
            && !(url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/'))
        {
            return Err("Image URL must be an absolute http(s) URL".to_string());
        }

        Ok(ProductInput {
            category_id,
            name: name.to_string(),
            slug,
            description: self.description.trim().to_string(),
            ingredients: non_empty(&self.ingredients),
            price,
            compare_at_price,
            stock,
            image_url,
            is_active: self.is_active.is_some(),
        })
    }
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            slug: product.slug.clone(),
            category_id: product
                .category_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            description: product.description.clone(),
            ingredients: product.ingredients.clone().unwrap_or_default(),
            price: product.price.plain(),
            compare_at_price: product
                .compare_at_price
                .map(Money::plain)
                .unwrap_or_default(),
            stock: product.stock.to_string(),
            image_url: product.image_url.clone().unwrap_or_default(),
            is_active: product.is_active.then(|| "on".to_string()),
        }
    }
}

/// Product listing template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub page: AdminPage,
    pub products: Vec<Product>,
    pub search: String,
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub flash: Flash,
}

impl ProductsIndexTemplate {
    #[must_use]
    pub fn page_link(&self, number: i64) -> String {
        if self.search.is_empty() {
            format!("/products?page={number}")
        } else {
            format!(
                "/products?page={number}&q={}",
                urlencoding::encode(&self.search)
            )
        }
    }
}

/// Product form template, shared by create and edit.
#[derive(Template, WebTemplate)]
#[template(path = "products/form.html")]
pub struct ProductFormTemplate {
    pub page: AdminPage,
    /// `None` when creating.
    pub product_id: Option<ProductId>,
    pub form: ProductForm,
    pub categories: Vec<CategoryWithCount>,
    pub error: Option<String>,
}

impl ProductFormTemplate {
    #[must_use]
    pub fn action(&self) -> String {
        self.product_id
            .map_or_else(|| "/products".to_string(), |id| format!("/products/{id}"))
    }

    #[must_use]
    pub fn category_options(&self) -> Vec<CategoryOption> {
        self.categories
            .iter()
            .map(|entry| {
                let id = entry.category.id.to_string();
                CategoryOption {
                    selected: self.form.category_id == id,
                    id,
                    name: entry.category.name.clone(),
                }
            })
            .collect()
    }
}

/// One `<option>` of the category select.
#[derive(Debug, Clone)]
pub struct CategoryOption {
    pub id: String,
    pub name: String,
    pub selected: bool,
}

/// List products, including inactive ones.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(query): Query<ProductQuery>,
) -> Result<impl IntoResponse> {
    let search = query.q.unwrap_or_default();
    let filter = ProductFilter {
        search: non_empty(&search),
        include_inactive: true,
        ..ProductFilter::default()
    };
    let paging = Page::new(query.page.unwrap_or(1), PER_PAGE);

    let products = ProductRepository::new(state.pool());
    let total = products.count(&filter).await?;
    let rows = products.list(&filter, paging).await?;

    Ok(ProductsIndexTemplate {
        page,
        products: rows,
        search,
        current_page: paging.number,
        total_pages: paging.page_count(total),
        total,
        flash: Flash {
            success: query.success,
            error: query.error,
        },
    })
}

/// New product form.
#[instrument(skip(state, page))]
pub async fn new(State(state): State<AppState>, page: AdminPage) -> Result<impl IntoResponse> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(ProductFormTemplate {
        page,
        product_id: None,
        form: ProductForm {
            is_active: Some("on".to_string()),
            stock: "0".to_string(),
            ..ProductForm::default()
        },
        categories,
        error: None,
    })
}

/// Re-render the form with a validation message.
async fn rejected_form(
    state: &AppState,
    page: AdminPage,
    product_id: Option<ProductId>,
    form: ProductForm,
    message: String,
) -> Result<Response> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    let template = ProductFormTemplate {
        page,
        product_id,
        form,
        categories,
        error: Some(message),
    };
    Ok((StatusCode::UNPROCESSABLE_ENTITY, template).into_response())
}

/// Create a product.
#[instrument(skip(state, page, form), fields(name = %form.name))]
pub async fn create(
    State(state): State<AppState>,
    page: AdminPage,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return rejected_form(&state, page, None, form, message).await,
    };

    match ProductRepository::new(state.pool()).create(&input).await {
        Ok(id) => {
            tracing::info!(product_id = %id, admin = %page.admin.id, "product created");
            Ok(Redirect::to(&with_message("/products", "success", "Product created")).into_response())
        }
        Err(RepositoryError::Conflict(message) | RepositoryError::Validation(message)) => {
            rejected_form(&state, page, None, form, message).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Edit product form.
#[instrument(skip(state, page))]
pub async fn edit(
    State(state): State<AppState>,
    page: AdminPage,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    let categories = CategoryRepository::new(state.pool()).list().await?;

    Ok(ProductFormTemplate {
        page,
        product_id: Some(id),
        form: ProductForm::from(&product),
        categories,
        error: None,
    })
}

/// Update a product.
#[instrument(skip(state, page, form))]
pub async fn update(
    State(state): State<AppState>,
    page: AdminPage,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return rejected_form(&state, page, Some(id), form, message).await,
    };

    match ProductRepository::new(state.pool()).update(id, &input).await {
        Ok(()) => {
            tracing::info!(product_id = %id, admin = %page.admin.id, "product updated");
            Ok(Redirect::to(&with_message("/products", "success", "Product saved")).into_response())
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Product".to_string())),
        Err(RepositoryError::Conflict(message) | RepositoryError::Validation(message)) => {
            rejected_form(&state, page, Some(id), form, message).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Activate or deactivate a product. Inactive products disappear from the
/// storefront but stay on past orders.
#[instrument(skip(state, admin))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    let products = ProductRepository::new(state.pool());
    let product = products
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

    let active = !product.is_active;
    products.set_active(id, active).await?;
    tracing::info!(product_id = %id, active, admin = %admin.id, "product visibility changed");

    let message = if active {
        "Product activated"
    } else {
        "Product deactivated"
    };
    Ok(Redirect::to(&with_message("/products", "success", message)))
}

/// Permanently delete a product.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<Redirect> {
    match ProductRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(product_id = %id, admin = %admin.id, "product deleted");
            Ok(Redirect::to(&with_message("/products", "success", "Product deleted")))
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Product".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> ProductForm {
        ProductForm {
            name: "Barrier Repair Serum".to_string(),
            category_id: "3".to_string(),
            description: "Ceramides and peptides.".to_string(),
            price: "899".to_string(),
            stock: "40".to_string(),
            is_active: Some("on".to_string()),
            ..ProductForm::default()
        }
    }

    #[test]
    fn slug_defaults_to_name() {
        let input = form().to_input().unwrap();
        assert_eq!(input.slug, "barrier-repair-serum");
        assert_eq!(input.category_id, Some(CategoryId::new(3)));
        assert_eq!(input.price, Money::from_cents(89_900));
        assert_eq!(input.stock, 40);
        assert!(input.is_active);
        assert_eq!(input.compare_at_price, None);
    }

    #[test]
    fn unticked_checkbox_deactivates() {
        let input = ProductForm {
            is_active: None,
            ..form()
        }
        .to_input()
        .unwrap();
        assert!(!input.is_active);
    }

    #[test]
    fn rejects_bad_numbers() {
        let bad_price = ProductForm {
            price: "abc".to_string(),
            ..form()
        };
        assert!(bad_price.to_input().unwrap_err().starts_with("Price"));

        let free = ProductForm {
            price: "0".to_string(),
            ..form()
        };
        assert!(free.to_input().is_err());

        let negative_stock = ProductForm {
            stock: "-1".to_string(),
            ..form()
        };
        assert!(negative_stock.to_input().is_err());
    }

    #[test]
    fn rejects_missing_name_and_odd_image_urls() {
        let unnamed = ProductForm {
            name: "  ".to_string(),
            ..form()
        };
        assert_eq!(unnamed.to_input().unwrap_err(), "Name is required");

        let script = ProductForm {
            image_url: "javascript:alert(1)".to_string(),
            ..form()
        };
        assert!(script.to_input().is_err());
    }
}
