use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    actions::users::user_exists,
    error::{is_foreign_key_violation, Error, HtmlError, QueryError},
    media::MediaStorage,
    pagination::PageRequest,
    schema::{AuthoredRecipe, Id, ShortRecipe, SubscriptionRow, UserSubscription},
};

const SUBSCRIPTION_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name, TRUE AS is_subscribed,
    (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
    COUNT(*) OVER() AS count";

fn reject_self(subscriber: Id, target: Id) -> Result<(), Error> {
    if subscriber == target {
        return Err(HtmlError::InvalidRequest.new("You cannot subscribe to yourself."));
    }
    Ok(())
}

pub async fn subscribe(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    subscriber: Id,
    target: Id,
    recipes_limit: Option<usize>,
) -> Result<UserSubscription, Error> {
    reject_self(subscriber, target)?;
    if !user_exists(pool, target).await? {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (subscriber_id, subscribed_to_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(subscriber)
    .bind(target)
    .execute(pool)
    .await
    .map_err(|e| match is_foreign_key_violation(&e) {
        true => HtmlError::NotFound.default(),
        false => QueryError::from(e).into(),
    })?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are already subscribed to this user."));
    }

    let row: SubscriptionRow = sqlx::query_as(&format!(
        "SELECT {SUBSCRIPTION_COLUMNS} FROM users u WHERE u.id = $1"
    ))
    .bind(target)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    let mut subscriptions = load_subscriptions(pool, media, vec![row], recipes_limit).await?;
    subscriptions
        .pop()
        .ok_or_else(|| HtmlError::InternalServerError.new("Subscription vanished"))
}

pub async fn unsubscribe(pool: &Pool<Postgres>, subscriber: Id, target: Id) -> Result<(), Error> {
    reject_self(subscriber, target)?;
    if !user_exists(pool, target).await? {
        return Err(HtmlError::NotFound.default());
    }

    let result =
        sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND subscribed_to_id = $2")
            .bind(subscriber)
            .bind(target)
            .execute(pool)
            .await
            .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new("You are not subscribed to this user."));
    }

    Ok(())
}

/// Followed users, most recent subscription first.
pub async fn fetch_subscriptions(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    subscriber: Id,
    page: PageRequest,
    recipes_limit: Option<usize>,
) -> Result<(Vec<UserSubscription>, i64), Error> {
    let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
        "
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.subscribed_to_id
        WHERE s.subscriber_id = $1
        ORDER BY s.created_at DESC, s.id DESC
        LIMIT $2 OFFSET $3
    "
    ))
    .bind(subscriber)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    page.check_rows(rows.len())?;
    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let subscriptions = load_subscriptions(pool, media, rows, recipes_limit).await?;

    Ok((subscriptions, total_count))
}

async fn load_subscriptions(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    rows: Vec<SubscriptionRow>,
    recipes_limit: Option<usize>,
) -> Result<Vec<UserSubscription>, Error> {
    let author_ids: Vec<Id> = rows.iter().map(|row| row.profile.id).collect();
    let recipes: Vec<AuthoredRecipe> = sqlx::query_as(
        "
        SELECT r.author_id, r.id, r.name, r.image, r.cooking_time
        FROM recipes r
        WHERE r.author_id = ANY($1)
        ORDER BY r.pub_date DESC, r.id DESC
    ",
    )
    .bind(&author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipe_map: HashMap<Id, Vec<ShortRecipe>> = HashMap::new();
    for AuthoredRecipe { author_id, recipe } in recipes {
        let list = recipe_map.entry(author_id).or_default();
        if recipes_limit.map_or(true, |limit| list.len() < limit) {
            list.push(ShortRecipe {
                image: media.resolve(recipe.image),
                ..recipe
            });
        }
    }

    Ok(rows
        .into_iter()
        .map(|row| UserSubscription {
            recipes: recipe_map.remove(&row.profile.id).unwrap_or_default(),
            recipes_count: row.recipes_count,
            profile: row.profile,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    #[test]
    fn self_subscription_is_rejected() {
        let error = reject_self(3, 3).unwrap_err();
        assert_eq!(error.code, StatusCode::BAD_REQUEST);
        assert!(reject_self(3, 4).is_ok());
    }
}
