//! Back-office status transitions.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use sqlx::PgPool;

use dewy_core::{OrderStatus, PaymentMethod, PaymentStatus};
use dewy_db::orders::{PlaceOrder, PlacedOrder};
use dewy_db::{CartRepository, OrderRepository, RepositoryError};
use dewy_integration_tests::{address, customer, product};

async fn placed_order(pool: &PgPool) -> PlacedOrder {
    let user = customer(pool, "status@example.com").await.unwrap();
    let serum = product(pool, "status-serum", 599, 5).await.unwrap();
    let address_id = address(pool, &user, "560001").await.unwrap();
    let carts = CartRepository::new(pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, serum, 1).await.unwrap();
    OrderRepository::new(pool)
        .place_order(&PlaceOrder {
            user_id: user.id,
            address_id,
            coupon_code: None,
            payment_method: PaymentMethod::Cod,
            now: Utc::now(),
        })
        .await
        .unwrap()
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn delivery_settles_cash_payment(pool: PgPool) {
    let placed = placed_order(&pool).await;
    let orders = OrderRepository::new(&pool);
    let id = placed.order.id;

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        orders.update_status(id, next, None, None).await.unwrap();
    }

    let history = orders.history(id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history.last().map(|h| h.status), Some(OrderStatus::Delivered));

    let payment = orders.payment_for_order(id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn skipping_a_step_is_refused(pool: PgPool) {
    let placed = placed_order(&pool).await;
    let orders = OrderRepository::new(&pool);

    let result = orders
        .update_status(placed.order.id, OrderStatus::Shipped, Some("too early"), None)
        .await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));

    let order = orders.get(placed.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn customer_can_cancel_pending_order(pool: PgPool) {
    let placed = placed_order(&pool).await;
    let orders = OrderRepository::new(&pool);

    let cancelled = orders
        .cancel_for_user(placed.order.user_id, &placed.order.order_number)
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let again = orders
        .cancel_for_user(placed.order.user_id, &placed.order.order_number)
        .await;
    assert!(matches!(again, Err(RepositoryError::Validation(_))));
}
