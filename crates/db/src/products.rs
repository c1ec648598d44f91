//! Product catalog repository.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};

use dewy_core::{CategoryId, Money, ProductId};

use crate::{Page, RepositoryError};

/// A catalog product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub ingredients: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }

    /// Sale price is shown only when the compare-at price is higher.
    #[must_use]
    pub fn on_sale(&self) -> bool {
        self.compare_at_price.is_some_and(|c| c > self.price)
    }
}

/// Listing sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => " ORDER BY p.created_at DESC, p.id DESC",
            Self::PriceAsc => " ORDER BY p.price ASC, p.id",
            Self::PriceDesc => " ORDER BY p.price DESC, p.id",
            Self::Name => " ORDER BY p.name ASC, p.id",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Name => "name",
        }
    }
}

/// Listing filter shared by the storefront and the back office.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub sort: ProductSort,
    /// Back-office listings include deactivated products.
    pub include_inactive: bool,
}

/// Fields for creating or editing a product.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub ingredients: Option<String>,
    pub price: Money,
    pub compare_at_price: Option<Money>,
    pub stock: i32,
    pub image_url: Option<String>,
    pub is_active: bool,
}

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.category_id, c.name AS category_name, c.slug AS category_slug,
           p.name, p.slug, p.description, p.ingredients, p.price, p.compare_at_price,
           p.stock, p.image_url, p.is_active, p.created_at, p.updated_at
    FROM shop.product p
    LEFT JOIN shop.category c ON c.id = p.category_id
";

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    builder.push(" WHERE TRUE");
    if !filter.include_inactive {
        builder.push(" AND p.is_active");
    }
    if let Some(slug) = &filter.category_slug {
        builder.push(" AND c.slug = ").push_bind(slug.clone());
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search.replace('%', "\\%").replace('_', "\\_"));
        builder
            .push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.ingredients ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Repository for product operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        push_filter(&mut builder, filter);
        builder.push(filter.sort.order_by());
        builder
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = builder
            .build_query_as::<Product>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Count products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, filter: &ProductFilter) -> Result<i64, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.product p LEFT JOIN shop.category c ON c.id = p.category_id",
        );
        push_filter(&mut builder, filter);

        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row)
    }

    /// Products by id, in no particular order. Missing ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
            .bind(&raw)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Other active products in the same category.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn related(&self, product: &Product, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };
        let rows = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.category_id = $1 AND p.id <> $2 AND p.is_active \
             ORDER BY p.created_at DESC LIMIT $3"
        ))
        .bind(category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput) -> Result<ProductId, RepositoryError> {
        let id = sqlx::query_scalar::<_, ProductId>(
            r"
            INSERT INTO shop.product
                (category_id, name, slug, description, ingredients, price,
                 compare_at_price, stock, image_url, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.ingredients.as_deref())
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "product slug already exists"))?;

        tracing::info!(product_id = %id, slug = %input.slug, "product created");
        Ok(id)
    }

    /// Update every editable field of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if missing, `Conflict` if the slug is taken.
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.product
            SET category_id = $2, name = $3, slug = $4, description = $5, ingredients = $6,
                price = $7, compare_at_price = $8, stock = $9, image_url = $10,
                is_active = $11, updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.category_id)
        .bind(input.name.trim())
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.ingredients.as_deref())
        .bind(input.price)
        .bind(input.compare_at_price)
        .bind(input.stock)
        .bind(input.image_url.as_deref())
        .bind(input.is_active)
        .execute(self.pool)
        .await
        .map_err(|e| RepositoryError::on_unique_violation(e, "product slug already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Soft delete or restore.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.product SET is_active = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Hard delete. Past order lines keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.product WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Add `delta` (which may be negative) to stock; refuses to go below zero.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` if stock would become negative,
    /// `NotFound` if the product does not exist.
    pub async fn adjust_stock(&self, id: ProductId, delta: i32) -> Result<i32, RepositoryError> {
        let stock = sqlx::query_scalar::<_, i32>(
            r"
            UPDATE shop.product SET stock = stock + $2, updated_at = now()
            WHERE id = $1 AND stock + $2 >= 0
            RETURNING stock
            ",
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool)
        .await?;

        match stock {
            Some(stock) => Ok(stock),
            None if self.get_by_id(id).await?.is_some() => Err(RepositoryError::Validation(
                "stock cannot go below zero".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Active products at or below `threshold` units.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(&self, threshold: i32, limit: i64) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.is_active AND p.stock <= $1 ORDER BY p.stock ASC, p.name LIMIT $2"
        ))
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
