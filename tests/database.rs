//! Runs against a throwaway database created by `sqlx::test`; needs `DATABASE_URL`.

use foodgram::{
    actions::{
        lists::{add_to_list, remove_from_list, RecipeList},
        recipes::fetch_recipes,
        subscriptions::{subscribe, unsubscribe},
    },
    error::is_foreign_key_violation,
    filters::RecipeFilter,
    media::MediaStorage,
    pagination::PageRequest,
    schema::Id,
};
use sqlx::PgPool;
use warp::http::StatusCode;

fn media() -> MediaStorage {
    MediaStorage::new(std::env::temp_dir().join("foodgram-db-tests"), "/media/")
}

async fn user(pool: &PgPool, name: &str) -> Id {
    let (id,): (Id,) = sqlx::query_as(
        "INSERT INTO users (email, username, first_name, last_name, password)
         VALUES ($1, $2, 'Test', 'User', 'unused') RETURNING id",
    )
    .bind(format!("{name}@example.com"))
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn recipe(pool: &PgPool, author: Id, name: &str) -> Id {
    let (id,): (Id,) = sqlx::query_as(
        "INSERT INTO recipes (author_id, name, text, cooking_time)
         VALUES ($1, $2, 'Cook it.', 10) RETURNING id",
    )
    .bind(author)
    .bind(name)
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

async fn favorited_ids(pool: &PgPool, viewer: Id) -> Vec<Id> {
    let filter = RecipeFilter {
        is_favorited: true,
        ..Default::default()
    };
    let (recipes, count) = fetch_recipes(
        pool,
        &media(),
        Some(viewer),
        &filter,
        PageRequest { page: 1, limit: 10 },
    )
    .await
    .unwrap();

    assert_eq!(count as usize, recipes.len());
    assert!(recipes.iter().all(|r| r.is_favorited));
    let mut ids: Vec<Id> = recipes.iter().map(|r| r.id).collect();
    ids.sort();
    ids
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn second_subscription_to_same_author_is_rejected(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let subscription = subscribe(&pool, &media(), alice, bob, None).await.unwrap();
    assert_eq!(subscription.profile.id, bob);
    assert!(subscription.profile.is_subscribed);

    let error = subscribe(&pool, &media(), alice, bob, None).await.unwrap_err();
    assert_eq!(error.code, StatusCode::BAD_REQUEST);

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn unsubscribing_requires_a_subscription(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let error = unsubscribe(&pool, alice, bob).await.unwrap_err();
    assert_eq!(error.code, StatusCode::BAD_REQUEST);

    subscribe(&pool, &media(), alice, bob, None).await.unwrap();
    unsubscribe(&pool, alice, bob).await.unwrap();

    let error = unsubscribe(&pool, alice, bob).await.unwrap_err();
    assert_eq!(error.code, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn unknown_author_cannot_be_followed(pool: PgPool) {
    let alice = user(&pool, "alice").await;

    let error = subscribe(&pool, &media(), alice, alice + 100, None)
        .await
        .unwrap_err();
    assert_eq!(error.code, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn favorited_filter_returns_only_own_favorites(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    let soup = recipe(&pool, alice, "Soup").await;
    let salad = recipe(&pool, alice, "Salad").await;
    let stew = recipe(&pool, bob, "Stew").await;
    recipe(&pool, bob, "Toast").await;

    add_to_list(&pool, &media(), RecipeList::Favorites, alice, soup)
        .await
        .unwrap();
    add_to_list(&pool, &media(), RecipeList::Favorites, bob, salad)
        .await
        .unwrap();
    add_to_list(&pool, &media(), RecipeList::Favorites, bob, stew)
        .await
        .unwrap();
    // A cart entry must not leak into the favorites filter.
    add_to_list(&pool, &media(), RecipeList::ShoppingCart, alice, stew)
        .await
        .unwrap();

    assert_eq!(favorited_ids(&pool, alice).await, vec![soup]);
    let mut expected = vec![salad, stew];
    expected.sort();
    assert_eq!(favorited_ids(&pool, bob).await, expected);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn adding_twice_to_a_list_is_rejected(pool: PgPool) {
    let alice = user(&pool, "alice").await;
    let soup = recipe(&pool, alice, "Soup").await;

    for list in [RecipeList::Favorites, RecipeList::ShoppingCart] {
        let short = add_to_list(&pool, &media(), list, alice, soup).await.unwrap();
        assert_eq!(short.id, soup);

        let error = add_to_list(&pool, &media(), list, alice, soup)
            .await
            .unwrap_err();
        assert_eq!(error.code, StatusCode::BAD_REQUEST, "{list:?}");

        remove_from_list(&pool, list, alice, soup).await.unwrap();
        let error = remove_from_list(&pool, list, alice, soup).await.unwrap_err();
        assert_eq!(error.code, StatusCode::BAD_REQUEST, "{list:?}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn list_membership_needs_an_existing_recipe(pool: PgPool) {
    let alice = user(&pool, "alice").await;

    let error = add_to_list(&pool, &media(), RecipeList::Favorites, alice, 404)
        .await
        .unwrap_err();
    assert_eq!(error.code, StatusCode::BAD_REQUEST);

    let error = remove_from_list(&pool, RecipeList::ShoppingCart, alice, 404)
        .await
        .unwrap_err();
    assert_eq!(error.code, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "needs DATABASE_URL"]
async fn deleted_recipe_is_a_foreign_key_violation(pool: PgPool) {
    let alice = user(&pool, "alice").await;

    let error = sqlx::query("INSERT INTO favorites (user_id, recipe_id) VALUES ($1, 404)")
        .bind(alice)
        .execute(&pool)
        .await
        .unwrap_err();
    assert!(is_foreign_key_violation(&error));

    let error = sqlx::query("INSERT INTO users (email) VALUES (NULL)")
        .execute(&pool)
        .await
        .unwrap_err();
    assert!(!is_foreign_key_violation(&error));
}
