//! Category management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tracing::instrument;

use dewy_core::CategoryId;
use dewy_db::categories::{CategoryInput, CategoryWithCount, slugify};
use dewy_db::{CategoryRepository, RepositoryError};

use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{AdminPage, RequireAdmin};
use crate::routes::{Flash, non_empty, with_message};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryForm {
    fn to_input(&self) -> std::result::Result<CategoryInput, String> {
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
        Ok(CategoryInput {
            name: name.to_string(),
            slug,
            description: non_empty(&self.description),
        })
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "categories/index.html")]
pub struct CategoriesTemplate {
    pub page: AdminPage,
    pub categories: Vec<CategoryWithCount>,
    pub flash: Flash,
}

/// List categories with product counts.
#[instrument(skip(state, page))]
pub async fn index(
    State(state): State<AppState>,
    page: AdminPage,
    Query(flash): Query<Flash>,
) -> Result<impl IntoResponse> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(CategoriesTemplate {
        page,
        categories,
        flash,
    })
}

/// Create a category.
#[instrument(skip(state, admin, form), fields(name = %form.name))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<CategoryForm>,
) -> Result<Redirect> {
    let input = match form.to_input() {
        Ok(input) => input,
        Err(message) => return Ok(Redirect::to(&with_message("/categories", "error", &message))),
    };

    match CategoryRepository::new(state.pool()).create(&input).await {
        Ok(category) => {
            tracing::info!(category_id = %category.id, admin = %admin.id, "category created");
            Ok(Redirect::to(&with_message("/categories", "success", "Category created")))
        }
        Err(RepositoryError::Conflict(message)) => {
            Ok(Redirect::to(&with_message("/categories", "error", &message)))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a category. Its products become uncategorised.
#[instrument(skip(state, admin))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Redirect> {
    match CategoryRepository::new(state.pool()).delete(id).await {
        Ok(()) => {
            tracing::info!(category_id = %id, admin = %admin.id, "category deleted");
            Ok(Redirect::to(&with_message("/categories", "success", "Category deleted")))
        }
        Err(RepositoryError::NotFound) => Err(AppError::NotFound("Category".to_string())),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn explicit_slug_is_normalised() {
        let form = CategoryForm {
            name: "Sun Care".to_string(),
            slug: "SPF & Sun".to_string(),
            description: String::new(),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input.slug, "spf-sun");
        assert_eq!(input.description, None);
    }

    #[test]
    fn name_required() {
        let form = CategoryForm {
            name: String::new(),
            slug: String::new(),
            description: String::new(),
        };
        assert!(form.to_input().is_err());
    }
}
