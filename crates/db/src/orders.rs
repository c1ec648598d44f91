//! Order repository.
//!
//! Orders are created only through [`OrderRepository::place_order`], which
//! turns a cart into an order inside a single transaction. Everything the
//! order needs later (prices, product names, the shipping address) is
//! snapshotted onto the order so catalog edits never rewrite history.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use dewy_core::coupon::{CouponRejection, normalize_code};
use dewy_core::delivery::{self, DEFAULT_ESTIMATE, DeliveryEstimate};
use dewy_core::pricing::{self, OrderQuote, PricedLine};
use dewy_core::{
    AddressId, Money, OrderId, OrderItemId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus,
    ProductId, UserId,
};

use crate::addresses::{ADDRESS_COLUMNS, Address};
use crate::{Page, RepositoryError, coupons, delivery as delivery_rules};

/// Note written on the first history row.
pub const PLACED_NOTE: &str = "Order placed";

/// A stored order.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
    pub ship_name: String,
    pub ship_phone: String,
    pub ship_line1: String,
    pub ship_line2: Option<String>,
    pub ship_city: String,
    pub ship_state: String,
    pub ship_postal_code: String,
    pub delivery_min_days: Option<i32>,
    pub delivery_max_days: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub const fn quote(&self) -> OrderQuote {
        OrderQuote {
            subtotal: self.subtotal,
            discount: self.discount_amount,
            shipping_fee: self.shipping_fee,
            total: self.total,
        }
    }

    /// Delivery window recorded at placement.
    #[must_use]
    pub const fn delivery_estimate(&self) -> Option<DeliveryEstimate> {
        match (self.delivery_min_days, self.delivery_max_days) {
            (Some(min_days), Some(max_days)) => Some(DeliveryEstimate { min_days, max_days }),
            _ => None,
        }
    }

    #[must_use]
    pub fn shipping_address(&self) -> String {
        let mut parts = vec![self.ship_line1.as_str()];
        if let Some(line2) = self.ship_line2.as_deref().filter(|l| !l.is_empty()) {
            parts.push(line2);
        }
        parts.extend([
            self.ship_city.as_str(),
            self.ship_state.as_str(),
            self.ship_postal_code.as_str(),
        ]);
        parts.join(", ")
    }
}

/// An order with its customer, for back-office listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderSummary {
    #[sqlx(flatten)]
    pub order: Order,
    pub customer_email: String,
    pub item_count: i64,
}

/// A line snapshotted at placement. `product_id` is cleared if the product
/// is later deleted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusHistoryEntry {
    pub id: i32,
    pub status: OrderStatus,
    pub note: Option<String>,
    pub changed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub amount: Money,
    pub provider_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checkout request.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    pub address_id: AddressId,
    pub coupon_code: Option<String>,
    pub payment_method: PaymentMethod,
    pub now: DateTime<Utc>,
}

/// The committed result of a checkout.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payment: Payment,
}

/// One CSV export row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExportRow {
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub customer_email: String,
    pub status: OrderStatus,
    pub items: String,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub shipping_fee: Money,
    pub total: Money,
    pub coupon_code: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: Option<PaymentStatus>,
    pub ship_city: String,
    pub ship_postal_code: String,
}

#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    id: ProductId,
    name: String,
    price: Money,
    stock: i32,
    is_active: bool,
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, subtotal, discount_amount, \
     shipping_fee, total, coupon_code, ship_name, ship_phone, ship_line1, ship_line2, ship_city, \
     ship_state, ship_postal_code, delivery_min_days, delivery_max_days, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, unit_price, quantity, line_total";

const PAYMENT_COLUMNS: &str =
    "id, order_id, method, status, amount, provider_reference, created_at, updated_at";

/// Attempts at a fresh order number before giving up.
const ORDER_NUMBER_ATTEMPTS: usize = 5;

/// Repository for order operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// Prices come from the catalog, never from the client. Products and
    /// the coupon are locked for the duration so concurrent checkouts can
    /// neither oversell stock nor exceed a coupon's usage limit.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty cart, an unavailable or short-stocked
    ///   product, or a rejected coupon. The message is shown to the shopper.
    /// - `NotFound` if the address does not belong to the user.
    /// - `Database` for anything else. Nothing is written on error.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn place_order(&self, request: &PlaceOrder) -> Result<PlacedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart = sqlx::query_as::<_, (dewy_core::CartId,)>(
            "SELECT id FROM shop.cart WHERE user_id = $1 FOR UPDATE",
        )
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((cart_id,)) = cart else {
            return Err(RepositoryError::Validation("cart is empty".to_owned()));
        };

        let quantities = sqlx::query_as::<_, (ProductId, i32)>(
            "SELECT product_id, quantity FROM shop.cart_item WHERE cart_id = $1 ORDER BY added_at, id",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;
        if quantities.is_empty() {
            return Err(RepositoryError::Validation("cart is empty".to_owned()));
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM shop.address WHERE id = $1 AND user_id = $2"
        ))
        .bind(request.address_id)
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let lines = lock_and_price(&mut tx, &quantities).await?;
        let subtotal = pricing::subtotal(&lines);

        let mut discount = Money::ZERO;
        let mut coupon_code = None;
        if let Some(raw) = request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
            let code = normalize_code(raw)
                .map_err(|_| RepositoryError::Validation(CouponRejection::NotFound.to_string()))?;
            let coupon = coupons::lock_by_code(&mut tx, &code)
                .await?
                .ok_or_else(|| RepositoryError::Validation(CouponRejection::NotFound.to_string()))?;
            discount = coupon
                .rules
                .evaluate(subtotal, request.now)
                .map_err(|rejection| RepositoryError::Validation(rejection.to_string()))?;

            sqlx::query("UPDATE shop.coupon SET used_count = used_count + 1 WHERE id = $1")
                .bind(coupon.id)
                .execute(&mut *tx)
                .await?;
            coupon_code = Some(coupon.code);
        }

        let quote = pricing::quote(&lines, discount);
        let rules = delivery_rules::active_rules(&mut *tx).await?;
        let estimate = delivery::estimate(&address.postal_code, &rules, DEFAULT_ESTIMATE)
            .unwrap_or(DEFAULT_ESTIMATE);

        let order = insert_order(&mut tx, request, &address, &quote, coupon_code, estimate).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let item = sqlx::query_as::<_, OrderItem>(&format!(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, product_name, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(order.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(line.unit_price)
            .bind(line.quantity)
            .bind(line.line_total())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item);

            let decremented = sqlx::query(
                "UPDATE shop.product SET stock = stock - $2, updated_at = now() \
                 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            if decremented == 0 {
                return Err(RepositoryError::Validation(format!(
                    "{} is out of stock",
                    line.name
                )));
            }
        }

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r"
            INSERT INTO shop.payment (order_id, method, status, amount)
            VALUES ($1, $2, 'pending', $3)
            RETURNING {PAYMENT_COLUMNS}
            "
        ))
        .bind(order.id)
        .bind(request.payment_method)
        .bind(order.total)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(&mut tx, order.id, OrderStatus::Pending, Some(PLACED_NOTE), None).await?;

        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total,
            lines = items.len(),
            "order placed"
        );

        Ok(PlacedOrder {
            order,
            items,
            payment,
        })
    }

    /// An order by number, scoped to its owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        order_number: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE order_number = $1 AND user_id = $2"
        ))
        .bind(order_number)
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM shop.order_item WHERE order_id = $1 ORDER BY id"
        ))
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(items)
    }

    /// Status changes, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, StatusHistoryEntry>(
            r"
            SELECT id, status, note, changed_by, created_at
            FROM shop.order_status_history
            WHERE order_id = $1
            ORDER BY created_at, id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn payment_for_order(&self, id: OrderId) -> Result<Option<Payment>, RepositoryError> {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM shop.payment WHERE order_id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(payment)
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(orders)
    }

    /// Back-office listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        search: Option<&str>,
        page: Page,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            r"
            SELECT o.id, o.order_number, o.user_id, o.status, o.subtotal, o.discount_amount,
                   o.shipping_fee, o.total, o.coupon_code, o.ship_name, o.ship_phone,
                   o.ship_line1, o.ship_line2, o.ship_city, o.ship_state, o.ship_postal_code,
                   o.delivery_min_days, o.delivery_max_days, o.created_at, o.updated_at,
                   u.email AS customer_email,
                   (SELECT COALESCE(SUM(quantity), 0) FROM shop.order_item oi
                     WHERE oi.order_id = o.id)::bigint AS item_count
            FROM shop.orders o
            JOIN shop.user_profile u ON u.id = o.user_id
            WHERE TRUE
            ",
        );
        push_order_filter(&mut builder, status, search);
        builder.push(" ORDER BY o.created_at DESC LIMIT ");
        builder.push_bind(page.limit());
        builder.push(" OFFSET ");
        builder.push_bind(page.offset());

        let rows = builder
            .build_query_as::<OrderSummary>()
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(
        &self,
        status: Option<OrderStatus>,
        search: Option<&str>,
    ) -> Result<i64, RepositoryError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM shop.orders o JOIN shop.user_profile u ON u.id = o.user_id WHERE TRUE",
        );
        push_order_filter(&mut builder, status, search);
        let count = builder
            .build_query_scalar::<i64>()
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Most recent orders, for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<OrderSummary>, RepositoryError> {
        self.list(None, None, Page::new(1, limit)).await
    }

    /// Move an order to `next`, recording who did it.
    ///
    /// Marking a cash-on-delivery order delivered also marks its payment
    /// paid.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not exist.
    /// - `Validation` if the transition is not allowed from the current
    ///   status.
    #[instrument(skip(self, note))]
    pub async fn update_status(
        &self,
        id: OrderId,
        next: OrderStatus,
        note: Option<&str>,
        changed_by: Option<UserId>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let order = transition_locked(&mut tx, id, next, note, changed_by).await?;

        if next == OrderStatus::Delivered {
            sqlx::query(
                r"
                UPDATE shop.payment SET status = 'paid', updated_at = now()
                WHERE order_id = $1 AND method = 'cod' AND status = 'pending'
                ",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, status = %next, "order status updated");
        Ok(order)
    }

    /// Customer-initiated cancellation. Only pending and confirmed orders
    /// can be cancelled this way.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the order does not belong to the user.
    /// - `Validation` if the order has progressed too far.
    #[instrument(skip(self))]
    pub async fn cancel_for_user(
        &self,
        user_id: UserId,
        order_number: &str,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (OrderId, OrderStatus)>(
            "SELECT id, status FROM shop.orders WHERE order_number = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(order_number)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((id, status)) = current else {
            return Err(RepositoryError::NotFound);
        };
        if !status.customer_cancellable() {
            return Err(RepositoryError::Validation(format!(
                "orders that are {} can no longer be cancelled",
                status.label().to_lowercase()
            )));
        }

        let order = transition_locked(
            &mut tx,
            id,
            OrderStatus::Cancelled,
            Some("Cancelled by customer"),
            Some(user_id),
        )
        .await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Orders placed in `[from, to)`, oldest first, for CSV export.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn export_rows(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ExportRow>, RepositoryError> {
        let rows = sqlx::query_as::<_, ExportRow>(
            r"
            SELECT o.order_number, o.created_at, u.email AS customer_email, o.status,
                   COALESCE((SELECT string_agg(oi.product_name || ' x' || oi.quantity, '; ' ORDER BY oi.id)
                             FROM shop.order_item oi WHERE oi.order_id = o.id), '') AS items,
                   o.subtotal, o.discount_amount, o.shipping_fee, o.total, o.coupon_code,
                   p.method AS payment_method, p.status AS payment_status,
                   o.ship_city, o.ship_postal_code
            FROM shop.orders o
            JOIN shop.user_profile u ON u.id = o.user_id
            LEFT JOIN shop.payment p ON p.order_id = o.id
            WHERE o.created_at >= $1 AND o.created_at < $2
            ORDER BY o.created_at
            ",
        )
        .bind(from)
        .bind(to)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Lock every product in the cart, in id order, and price the lines from
/// the catalog.
async fn lock_and_price(
    conn: &mut PgConnection,
    quantities: &[(ProductId, i32)],
) -> Result<Vec<PricedLine>, RepositoryError> {
    let ids: Vec<i32> = quantities.iter().map(|(id, _)| id.as_i32()).collect();
    let products = sqlx::query_as::<_, LockedProduct>(
        "SELECT id, name, price, stock, is_active FROM shop.product \
         WHERE id = ANY($1) ORDER BY id FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut lines = Vec::with_capacity(quantities.len());
    for &(product_id, quantity) in quantities {
        let product = products
            .iter()
            .find(|p| p.id == product_id)
            .ok_or_else(|| {
                RepositoryError::Validation("a product in your cart is no longer sold".to_owned())
            })?;
        if !product.is_active {
            return Err(RepositoryError::Validation(format!(
                "{} is no longer available",
                product.name
            )));
        }
        if quantity > product.stock {
            return Err(RepositoryError::Validation(if product.stock == 0 {
                format!("{} is out of stock", product.name)
            } else {
                format!("only {} of {} left in stock", product.stock, product.name)
            }));
        }
        lines.push(PricedLine {
            product_id,
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
        });
    }
    Ok(lines)
}

/// Insert the order row, retrying on the rare order-number collision.
async fn insert_order(
    conn: &mut PgConnection,
    request: &PlaceOrder,
    address: &Address,
    quote: &OrderQuote,
    coupon_code: Option<String>,
    estimate: DeliveryEstimate,
) -> Result<Order, RepositoryError> {
    let mut rng = StdRng::from_os_rng();
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let order_number = pricing::generate_order_number(request.now, &mut rng);
        // Savepoint so a collision does not abort the outer transaction.
        sqlx::query("SAVEPOINT order_number").execute(&mut *conn).await?;
        let inserted = sqlx::query_as::<_, Order>(&format!(
            r"
            INSERT INTO shop.orders
                (order_number, user_id, status, subtotal, discount_amount, shipping_fee, total,
                 coupon_code, ship_name, ship_phone, ship_line1, ship_line2, ship_city, ship_state,
                 ship_postal_code, delivery_min_days, delivery_max_days, created_at, updated_at)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $17)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&order_number)
        .bind(request.user_id)
        .bind(quote.subtotal)
        .bind(quote.discount)
        .bind(quote.shipping_fee)
        .bind(quote.total)
        .bind(coupon_code.as_deref())
        .bind(&address.full_name)
        .bind(&address.phone)
        .bind(&address.line1)
        .bind(address.line2.as_deref())
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(estimate.min_days)
        .bind(estimate.max_days)
        .bind(request.now)
        .fetch_one(&mut *conn)
        .await;

        match inserted {
            Ok(order) => {
                sqlx::query("RELEASE SAVEPOINT order_number").execute(&mut *conn).await?;
                return Ok(order);
            }
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                tracing::warn!(%order_number, "order number collision, retrying");
                sqlx::query("ROLLBACK TO SAVEPOINT order_number")
                    .execute(&mut *conn)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(RepositoryError::Conflict(
        "could not allocate an order number".to_owned(),
    ))
}

async fn insert_history(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
    note: Option<&str>,
    changed_by: Option<UserId>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO shop.order_status_history (order_id, status, note, changed_by) \
         VALUES ($1, $2, $3, $4)",
    )
    .bind(order_id)
    .bind(status)
    .bind(note.map(str::trim).filter(|n| !n.is_empty()))
    .bind(changed_by)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Lock the order, validate the move and write it with a history row.
async fn transition_locked(
    conn: &mut PgConnection,
    id: OrderId,
    next: OrderStatus,
    note: Option<&str>,
    changed_by: Option<UserId>,
) -> Result<Order, RepositoryError> {
    let current = sqlx::query_scalar::<_, OrderStatus>(
        "SELECT status FROM shop.orders WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(RepositoryError::NotFound)?;

    current
        .transition(next)
        .map_err(|e| RepositoryError::Validation(e.to_string()))?;

    let order = sqlx::query_as::<_, Order>(&format!(
        "UPDATE shop.orders SET status = $2, updated_at = now() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    ))
    .bind(id)
    .bind(next)
    .fetch_one(&mut *conn)
    .await?;

    insert_history(conn, id, next, note, changed_by).await?;
    Ok(order)
}

fn push_order_filter(
    builder: &mut QueryBuilder<'_, Postgres>,
    status: Option<OrderStatus>,
    search: Option<&str>,
) {
    if let Some(status) = status {
        builder.push(" AND o.status = ");
        builder.push_bind(status);
    }
    if let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        builder.push(" AND (o.order_number ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR u.email ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR o.ship_name ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::new(1),
            order_number: "DW-20261018-ABCDEF".to_owned(),
            user_id: UserId::new(7),
            status: OrderStatus::Pending,
            subtotal: Money::const_cents(60_000),
            discount_amount: Money::const_cents(6_000),
            shipping_fee: Money::ZERO,
            total: Money::const_cents(54_000),
            coupon_code: Some("GLOW10".to_owned()),
            ship_name: "Asha Rao".to_owned(),
            ship_phone: "9876543210".to_owned(),
            ship_line1: "12 Lake Road".to_owned(),
            ship_line2: None,
            ship_city: "Pune".to_owned(),
            ship_state: "MH".to_owned(),
            ship_postal_code: "411001".to_owned(),
            delivery_min_days: Some(2),
            delivery_max_days: Some(4),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn shipping_address_skips_empty_second_line() {
        let mut o = order();
        assert_eq!(o.shipping_address(), "12 Lake Road, Pune, MH, 411001");
        o.ship_line2 = Some("Flat 4".to_owned());
        assert_eq!(o.shipping_address(), "12 Lake Road, Flat 4, Pune, MH, 411001");
    }

    #[test]
    fn delivery_estimate_needs_both_bounds() {
        let mut o = order();
        assert_eq!(
            o.delivery_estimate(),
            Some(DeliveryEstimate {
                min_days: 2,
                max_days: 4
            })
        );
        o.delivery_max_days = None;
        assert_eq!(o.delivery_estimate(), None);
    }

    #[test]
    fn quote_reflects_stored_amounts() {
        let q = order().quote();
        assert_eq!(q.total, q.subtotal - q.discount + q.shipping_fee);
    }
}
