//! Saved address limit and default handling.

#![allow(clippy::unwrap_used)]

use sqlx::PgPool;

use dewy_db::{AddressRepository, RepositoryError};
use dewy_integration_tests::{address, customer};

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn third_address_is_refused(pool: PgPool) {
    let user = customer(&pool, "addresses@example.com").await.unwrap();
    let home = address(&pool, &user, "560034").await.unwrap();
    let office = address(&pool, &user, "560001").await.unwrap();

    let third = address(&pool, &user, "110001").await;
    assert!(
        matches!(third, Err(RepositoryError::Validation(_))),
        "{third:?}"
    );

    let repo = AddressRepository::new(&pool);
    let saved = repo.list_for_user(user.id).await.unwrap();
    assert_eq!(saved.len(), 2);
    let default = saved.iter().find(|a| a.is_default).unwrap();
    assert_eq!(default.id, home);

    // Removing the default hands it to the remaining address.
    repo.delete(user.id, home).await.unwrap();
    let saved = repo.list_for_user(user.id).await.unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].id, office);
    assert!(saved[0].is_default);

    // A slot is free again.
    address(&pool, &user, "110001").await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires PostgreSQL"]
async fn addresses_are_private_to_their_owner(pool: PgPool) {
    let owner = customer(&pool, "owner@example.com").await.unwrap();
    let other = customer(&pool, "other@example.com").await.unwrap();
    let home = address(&pool, &owner, "560034").await.unwrap();

    let repo = AddressRepository::new(&pool);
    assert!(matches!(
        repo.delete(other.id, home).await,
        Err(RepositoryError::NotFound)
    ));
    assert_eq!(repo.list_for_user(owner.id).await.unwrap().len(), 1);
}
