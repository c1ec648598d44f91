//! Sales reporting buckets.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use sqlx::PgPool;

use dewy_core::PaymentMethod;
use dewy_db::orders::PlaceOrder;
use dewy_db::{AnalyticsRepository, CartRepository, OrderRepository};
use dewy_integration_tests::{address, customer, product, whole};

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn daily_sales_buckets_by_utc_day(pool: PgPool) {
    let user = customer(&pool, "late@example.com").await.unwrap();
    let cream = product(&pool, "night-cream", 1200, 5).await.unwrap();
    let address_id = address(&pool, &user, "560001").await.unwrap();
    let carts = CartRepository::new(&pool);
    let cart_id = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(cart_id, cream, 1).await.unwrap();

    let placed = OrderRepository::new(&pool)
        .place_order(&PlaceOrder {
            user_id: user.id,
            address_id,
            coupon_code: None,
            payment_method: PaymentMethod::Cod,
            now: Utc::now(),
        })
        .await
        .unwrap();

    // Late evening UTC is already tomorrow in UTC+14.
    sqlx::query(
        "UPDATE shop.orders \
         SET created_at = date_trunc('day', now() AT TIME ZONE 'UTC') AT TIME ZONE 'UTC' \
                          + interval '23 hours 30 minutes' \
         WHERE id = $1",
    )
    .bind(placed.order.id)
    .execute(&pool)
    .await
    .unwrap();

    let options = (*pool.connect_options())
        .clone()
        .options([("timezone", "Pacific/Kiritimati")]);
    let shifted = PgPool::connect_with(options).await.unwrap();

    let days = AnalyticsRepository::new(&shifted).daily_sales(7).await.unwrap();
    assert_eq!(days.len(), 7);
    let today = days.last().unwrap();
    assert_eq!(today.day, Utc::now().date_naive());
    assert_eq!(today.orders, 1);
    assert_eq!(today.revenue, whole(1200));
}
