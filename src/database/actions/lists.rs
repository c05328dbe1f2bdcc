use sqlx::{Pool, Postgres};

use crate::{
    actions::recipes::get_short_recipe,
    error::{is_foreign_key_violation, Error, HtmlError, QueryError},
    media::MediaStorage,
    schema::{Id, ShortRecipe},
};

/// Per-user recipe sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "the shopping cart",
        }
    }
}

/// An unknown recipe is a bad request here, not a missing resource.
pub async fn add_to_list(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    list: RecipeList,
    user_id: Id,
    recipe_id: Id,
) -> Result<ShortRecipe, Error> {
    let recipe = get_short_recipe(pool, media, recipe_id)
        .await?
        .ok_or_else(|| HtmlError::InvalidRequest.new("Recipe does not exist."))?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(|e| match is_foreign_key_violation(&e) {
        true => HtmlError::InvalidRequest.new("Recipe does not exist."),
        false => QueryError::from(e).into(),
    })?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Recipe is already in {}.",
            list.label()
        )));
    }

    Ok(recipe)
}

pub async fn remove_from_list(
    pool: &Pool<Postgres>,
    list: RecipeList,
    user_id: Id,
    recipe_id: Id,
) -> Result<(), Error> {
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM recipes WHERE id = $1)")
        .bind(recipe_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;
    if !exists.0 {
        return Err(HtmlError::NotFound.default());
    }

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(HtmlError::InvalidRequest.new(&format!(
            "Recipe is not in {}.",
            list.label()
        )));
    }

    Ok(())
}
