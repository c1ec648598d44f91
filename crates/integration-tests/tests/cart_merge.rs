//! Anonymous cart merge at sign-in.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use dewy_db::CartRepository;
use dewy_integration_tests::{customer, product};

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn merge_sums_shared_products(pool: PgPool) {
    let user = customer(&pool, "merge@example.com").await.unwrap();
    let serum = product(&pool, "merge-serum", 599, 20).await.unwrap();
    let cream = product(&pool, "merge-cream", 649, 20).await.unwrap();

    let carts = CartRepository::new(&pool);
    let user_cart = carts.get_or_create_for_user(user.id).await.unwrap();
    carts.add_item(user_cart, serum, 1).await.unwrap();

    let guest_cart = carts.get_or_create_for_session("guest-token").await.unwrap();
    carts.add_item(guest_cart, serum, 2).await.unwrap();
    carts.add_item(guest_cart, cream, 1).await.unwrap();

    let merged = carts
        .merge_session_into_user("guest-token", user.id)
        .await
        .unwrap();
    assert_eq!(merged, 2);

    let lines = carts.lines(user_cart).await.unwrap();
    let quantity_of = |id| lines.iter().find(|l| l.product_id == id).map(|l| l.quantity);
    assert_eq!(quantity_of(serum), Some(3));
    assert_eq!(quantity_of(cream), Some(1));
    assert!(carts.find_for_session("guest-token").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn merge_without_guest_cart_is_a_no_op(pool: PgPool) {
    let user = customer(&pool, "nocart@example.com").await.unwrap();
    let merged = CartRepository::new(&pool)
        .merge_session_into_user("never-used", user.id)
        .await
        .unwrap();
    assert_eq!(merged, 0);
}
