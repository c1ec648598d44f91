//! Order placement against a real database.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use sqlx::PgPool;

use dewy_core::{OrderStatus, PaymentMethod, PaymentStatus};
use dewy_db::orders::PlaceOrder;
use dewy_db::{CartRepository, DeliveryRepository, OrderRepository, ProductRepository, RepositoryError};
use dewy_integration_tests::{address, coupon, customer, product, whole};

fn checkout(user_id: dewy_core::UserId, address_id: dewy_core::AddressId, code: Option<&str>) -> PlaceOrder {
    PlaceOrder {
        user_id,
        address_id,
        coupon_code: code.map(str::to_string),
        payment_method: PaymentMethod::Cod,
        now: Utc::now(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn places_order_and_empties_cart(pool: PgPool) {
    let user = customer(&pool, "asha@example.com").await.unwrap();
    let serum = product(&pool, "niacinamide-serum", 599, 10).await.unwrap();
    let address_id = address(&pool, &user, "560001").await.unwrap();

    let carts = CartRepository::new(&pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, serum, 2).await.unwrap();

    let placed = OrderRepository::new(&pool)
        .place_order(&checkout(user.id, address_id, None))
        .await
        .unwrap();

    assert_eq!(placed.order.status, OrderStatus::Pending);
    assert!(placed.order.order_number.starts_with("DW-"));
    assert_eq!(placed.order.subtotal, whole(1198));
    assert!(placed.order.shipping_fee.is_zero());
    assert_eq!(placed.order.total, whole(1198));
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.payment.status, PaymentStatus::Pending);
    assert_eq!(placed.payment.amount, placed.order.total);

    let stock = ProductRepository::new(&pool)
        .get_by_id(serum)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 8);
    assert!(carts.lines(cart_id).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn small_orders_pay_shipping(pool: PgPool) {
    let user = customer(&pool, "ravi@example.com").await.unwrap();
    let cleanser = product(&pool, "gel-cleanser", 349, 5).await.unwrap();
    let address_id = address(&pool, &user, "110001").await.unwrap();

    let carts = CartRepository::new(&pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, cleanser, 1).await.unwrap();

    let placed = OrderRepository::new(&pool)
        .place_order(&checkout(user.id, address_id, None))
        .await
        .unwrap();

    assert_eq!(placed.order.shipping_fee, whole(49));
    assert_eq!(placed.order.total, whole(398));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn empty_cart_is_rejected(pool: PgPool) {
    let user = customer(&pool, "empty@example.com").await.unwrap();
    let address_id = address(&pool, &user, "400001").await.unwrap();

    let result = OrderRepository::new(&pool)
        .place_order(&checkout(user.id, address_id, None))
        .await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn last_unit_cannot_be_sold_twice(pool: PgPool) {
    let first = customer(&pool, "first@example.com").await.unwrap();
    let second = customer(&pool, "second@example.com").await.unwrap();
    let drops = product(&pool, "vitamin-c-drops", 749, 1).await.unwrap();
    let first_address = address(&pool, &first, "560001").await.unwrap();
    let second_address = address(&pool, &second, "560002").await.unwrap();

    let carts = CartRepository::new(&pool);
    for user in [&first, &second] {
        let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
        carts.add_item(cart_id, drops, 1).await.unwrap();
    }

    let orders = OrderRepository::new(&pool);
    orders
        .place_order(&checkout(first.id, first_address, None))
        .await
        .unwrap();
    let result = orders
        .place_order(&checkout(second.id, second_address, None))
        .await;
    assert!(matches!(result, Err(RepositoryError::Validation(_))));

    let stock = ProductRepository::new(&pool)
        .get_by_id(drops)
        .await
        .unwrap()
        .unwrap()
        .stock;
    assert_eq!(stock, 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn coupon_usage_limit_is_enforced(pool: PgPool) {
    coupon(&pool, "ONCE20", 20, Some(1)).await.unwrap();
    let serum = product(&pool, "barrier-serum", 1000, 10).await.unwrap();

    let orders = OrderRepository::new(&pool);
    let carts = CartRepository::new(&pool);
    let mut results = Vec::new();
    for email in ["one@example.com", "two@example.com"] {
        let user = customer(&pool, email).await.unwrap();
        let address_id = address(&pool, &user, "560001").await.unwrap();
        let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
        carts.add_item(cart_id, serum, 1).await.unwrap();
        results.push(
            orders
                .place_order(&checkout(user.id, address_id, Some("once20")))
                .await,
        );
    }

    let placed = results.remove(0).unwrap();
    assert_eq!(placed.order.coupon_code.as_deref(), Some("ONCE20"));
    assert_eq!(placed.order.discount_amount, whole(200));
    assert_eq!(placed.order.total, whole(800));
    assert!(matches!(results.remove(0), Err(RepositoryError::Validation(_))));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn padded_coupon_code_is_accepted(pool: PgPool) {
    coupon(&pool, "GLOW10", 10, None).await.unwrap();
    let user = customer(&pool, "padded@example.com").await.unwrap();
    let serum = product(&pool, "glow-serum", 1000, 5).await.unwrap();
    let address_id = address(&pool, &user, "560001").await.unwrap();
    let carts = CartRepository::new(&pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, serum, 1).await.unwrap();

    let placed = OrderRepository::new(&pool)
        .place_order(&checkout(user.id, address_id, Some("  glow10 ")))
        .await
        .unwrap();
    assert_eq!(placed.order.coupon_code.as_deref(), Some("GLOW10"));
    assert_eq!(placed.order.discount_amount, whole(100));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn delivery_window_comes_from_longest_prefix(pool: PgPool) {
    let delivery = DeliveryRepository::new(&pool);
    delivery.create("560", 2, 3, true).await.unwrap();
    delivery.create("5600", 1, 2, true).await.unwrap();

    let user = customer(&pool, "window@example.com").await.unwrap();
    let serum = product(&pool, "hydrating-serum", 699, 3).await.unwrap();
    let address_id = address(&pool, &user, "560034").await.unwrap();
    let carts = CartRepository::new(&pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, serum, 1).await.unwrap();

    let placed = OrderRepository::new(&pool)
        .place_order(&checkout(user.id, address_id, None))
        .await
        .unwrap();
    assert_eq!(placed.order.delivery_min_days, Some(1));
    assert_eq!(placed.order.delivery_max_days, Some(2));
}
