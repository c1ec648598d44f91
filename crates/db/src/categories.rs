//! Product categories.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use dewy_core::CategoryId;

use crate::RepositoryError;

/// A catalog category.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A category with the number of active products in it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// Fields for creating or editing a category.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

/// Lower-case, hyphen-separated slug from free text.
///
/// ```
/// assert_eq!(dewy_db::categories::slugify("  Vitamin C Serums! "), "vitamin-c-serums");
/// ```
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Repository for category operations.
pub struct CategoryRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CategoryRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All categories by name, with active product counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<CategoryWithCount>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryWithCount>(
            r"
            SELECT c.id, c.name, c.slug, c.description, c.created_at,
                   COUNT(p.id) FILTER (WHERE p.is_active) AS product_count
            FROM shop.category c
            LEFT JOIN shop.product p ON p.category_id = c.id
            GROUP BY c.id
            ORDER BY c.name
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM shop.category WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, Category>(
            "SELECT id, name, slug, description, created_at FROM shop.category WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row)
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &CategoryInput) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, Category>(
            r"
            INSERT INTO shop.category (name, slug, description)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, description, created_at
            ",
        )
        .bind(input.name.trim())
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "category slug already exists"))?;

        Ok(row)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing, `Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, RepositoryError> {
        sqlx::query_as::<_, Category>(
            r"
            UPDATE shop.category SET name = $2, slug = $3, description = $4
            WHERE id = $1
            RETURNING id, name, slug, description, created_at
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(&input.slug)
        .bind(input.description.as_deref())
        .fetch_optional(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "category slug already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a category. Its products become uncategorised.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist.
    pub async fn delete(&self, id: CategoryId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.category WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Cleansers & Toners"), "cleansers-toners");
        assert_eq!(slugify("--SPF 50+--"), "spf-50");
        assert_eq!(slugify("   "), "");
    }
}
