//! Cart repository.
//!
//! A cart is owned either by a signed-in user or by an anonymous session
//! token. When a visitor signs in, their anonymous cart is folded into the
//! user's cart with [`CartRepository::merge_session_into_user`].

use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use dewy_core::cart::{self, CartError, CartLine, MergeAction};
use dewy_core::pricing::PricedLine;
use dewy_core::{CartId, Money, ProductId, UserId};

use crate::RepositoryError;

/// A cart line joined with its product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub unit_price: Money,
    pub quantity: i32,
    pub stock: i32,
    pub is_active: bool,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * u32::try_from(self.quantity).unwrap_or(0)
    }

    /// Whether checkout would accept this line as it stands.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.is_active && self.quantity <= self.stock
    }

    #[must_use]
    pub fn priced(&self) -> PricedLine {
        PricedLine {
            product_id: self.product_id,
            name: self.name.clone(),
            unit_price: self.unit_price,
            quantity: self.quantity,
        }
    }
}

impl From<CartError> for RepositoryError {
    fn from(err: CartError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductStockRow {
    stock: i32,
    is_active: bool,
}

const CART_ITEM_SELECT: &str = r"
    SELECT ci.product_id, p.name, p.slug, p.image_url, p.price AS unit_price,
           ci.quantity, p.stock, p.is_active
    FROM shop.cart_item ci
    JOIN shop.product p ON p.id = ci.product_id
    WHERE ci.cart_id = $1
    ORDER BY ci.added_at, ci.id
";

/// Repository for cart operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_user(&self, user_id: UserId) -> Result<Option<CartId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>("SELECT id FROM shop.cart WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// The anonymous cart for a session token, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_session(&self, token: &str) -> Result<Option<CartId>, RepositoryError> {
        let id =
            sqlx::query_scalar::<_, CartId>("SELECT id FROM shop.cart WHERE session_token = $1")
                .bind(token)
                .fetch_optional(self.pool)
                .await?;
        Ok(id)
    }

    /// The user's cart, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_user(&self, user_id: UserId) -> Result<CartId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO shop.cart (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// The anonymous cart for `token`, created on first use.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_or_create_for_session(&self, token: &str) -> Result<CartId, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO shop.cart (session_token) VALUES ($1)
            ON CONFLICT (session_token) DO UPDATE SET updated_at = now()
            RETURNING id
            ",
        )
        .bind(token)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    /// Lines in a cart with current product data.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, cart_id: CartId) -> Result<Vec<CartItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartItem>(CART_ITEM_SELECT)
            .bind(cart_id)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// Total units in a cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn item_count(&self, cart_id: CartId) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::bigint FROM shop.cart_item WHERE cart_id = $1",
        )
        .bind(cart_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Add `quantity` units, summing with any existing line.
    ///
    /// Returns the new line quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when the product is unavailable or
    /// the summed quantity exceeds stock or the per-line limit.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i32, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let product = lock_product(&mut tx, product_id).await?;
        let existing = sqlx::query_scalar::<_, i32>(
            "SELECT quantity FROM shop.cart_item WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .unwrap_or(0);

        if quantity < 1 {
            return Err(CartError::InvalidQuantity.into());
        }
        let new_quantity = existing + quantity;
        cart::check_quantity(new_quantity, product.stock)?;

        upsert_line(&mut tx, cart_id, product_id, new_quantity).await?;
        touch(&mut tx, cart_id).await?;
        tx.commit().await?;

        Ok(new_quantity)
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Validation` when the quantity exceeds stock
    /// or the per-line limit.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<(), RepositoryError> {
        if quantity <= 0 {
            return self.remove_item(cart_id, product_id).await;
        }

        let mut tx = self.pool.begin().await?;
        let product = lock_product(&mut tx, product_id).await?;
        cart::check_quantity(quantity, product.stock)?;

        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3 WHERE cart_id = $1 AND product_id = $2",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        touch(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove a line. Removing a missing line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        product_id: ProductId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete the cart and its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_cart(&self, cart_id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart WHERE id = $1")
            .bind(cart_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Fold the anonymous cart for `token` into the user's cart.
    ///
    /// Quantities of products present in both carts are summed. The
    /// anonymous cart is deleted afterwards. Returns the number of lines
    /// written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// changed in that case.
    #[instrument(skip(self, token))]
    pub async fn merge_session_into_user(
        &self,
        token: &str,
        user_id: UserId,
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let anonymous_cart = sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM shop.cart WHERE session_token = $1 FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(anonymous_cart) = anonymous_cart else {
            return Ok(0);
        };

        let user_cart = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO shop.cart (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = now()
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let anonymous_lines = raw_lines(&mut tx, anonymous_cart).await?;
        let user_lines = raw_lines(&mut tx, user_cart).await?;
        let actions = cart::merge_lines(&user_lines, &anonymous_lines);

        for action in &actions {
            let (MergeAction::Update {
                product_id,
                quantity,
            }
            | MergeAction::Insert {
                product_id,
                quantity,
            }) = *action;
            upsert_line(&mut tx, user_cart, product_id, quantity).await?;
        }

        sqlx::query("DELETE FROM shop.cart WHERE id = $1")
            .bind(anonymous_cart)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(%user_id, merged = actions.len(), "anonymous cart merged");
        Ok(actions.len())
    }
}

async fn lock_product(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<ProductStockRow, RepositoryError> {
    let product = sqlx::query_as::<_, ProductStockRow>(
        "SELECT stock, is_active FROM shop.product WHERE id = $1 FOR SHARE",
    )
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    if !product.is_active {
        return Err(CartError::Unavailable.into());
    }
    Ok(product)
}

async fn raw_lines(
    conn: &mut PgConnection,
    cart_id: CartId,
) -> Result<Vec<CartLine>, RepositoryError> {
    let rows = sqlx::query_as::<_, (ProductId, i32)>(
        "SELECT product_id, quantity FROM shop.cart_item WHERE cart_id = $1 ORDER BY added_at, id",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, quantity)| CartLine {
            product_id,
            quantity,
        })
        .collect())
}

async fn upsert_line(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO shop.cart_item (cart_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        ",
    )
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn touch(conn: &mut PgConnection, cart_id: CartId) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE shop.cart SET updated_at = now() WHERE id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
