use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    actions::{ingredients::missing_ingredients, tags::missing_tags, users::list_user_profiles},
    error::{Error, FieldErrors, HtmlError, QueryError},
    filters::RecipeFilter,
    form::RecipeChanges,
    media::MediaStorage,
    pagination::PageRequest,
    schema::{
        Id, IngredientAmount, LinkedIngredient, LinkedTag, Recipe, RecipeRow, ShortRecipe, Tag,
        UserProfile,
    },
};

/// Appends the `recipes r` columns read by [`RecipeRow`], with the membership
/// flags evaluated for `viewer`.
fn push_recipe_columns(builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Id>) {
    builder
        .push(
            "SELECT r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.pub_date, \
             EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
        )
        .push_bind(viewer)
        .push(
            ") AS is_favorited, \
             EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
        )
        .push_bind(viewer)
        .push(") AS is_in_shopping_cart, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");
}

/// Newest recipes first.
pub async fn fetch_recipes(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    viewer: Option<Id>,
    filter: &RecipeFilter,
    page: PageRequest,
) -> Result<(Vec<Recipe>, i64), Error> {
    let mut builder = QueryBuilder::new("");
    push_recipe_columns(&mut builder, viewer);
    filter.push_conditions(&mut builder, viewer);
    builder
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    page.check_rows(rows.len())?;
    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = load_recipes(pool, media, viewer, rows).await?;

    Ok((recipes, total_count))
}

pub async fn get_recipe(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    viewer: Option<Id>,
    id: Id,
) -> Result<Option<Recipe>, Error> {
    let mut builder = QueryBuilder::new("");
    push_recipe_columns(&mut builder, viewer);
    builder.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = builder
        .build_query_as()
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(row) => Ok(load_recipes(pool, media, viewer, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

/// Attaches tags, ingredients and author profiles, three queries for the whole batch.
async fn load_recipes(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    viewer: Option<Id>,
    rows: Vec<RecipeRow>,
) -> Result<Vec<Recipe>, Error> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let recipe_ids: Vec<Id> = rows.iter().map(|row| row.id).collect();
    let mut author_ids: Vec<Id> = rows.iter().map(|row| row.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let tags: Vec<LinkedTag> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let ingredients: Vec<LinkedIngredient> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(&recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let authors: HashMap<Id, UserProfile> = list_user_profiles(pool, viewer, &author_ids)
        .await?
        .into_iter()
        .map(|profile| (profile.id, profile))
        .collect();

    let mut tag_map: HashMap<Id, Vec<Tag>> = HashMap::new();
    tags.into_iter()
        .for_each(|x| tag_map.entry(x.recipe_id).or_default().push(x.tag));
    let mut ingredient_map: HashMap<Id, Vec<IngredientAmount>> = HashMap::new();
    ingredients
        .into_iter()
        .for_each(|x| ingredient_map.entry(x.recipe_id).or_default().push(x.ingredient));

    rows.into_iter()
        .map(|row| {
            let author = authors.get(&row.author_id).cloned().ok_or_else(|| {
                log::error!("Recipe {} has no author {}", row.id, row.author_id);
                HtmlError::InternalServerError.new("Recipe author is missing")
            })?;
            Ok(Recipe {
                id: row.id,
                tags: tag_map.remove(&row.id).unwrap_or_default(),
                author,
                ingredients: ingredient_map.remove(&row.id).unwrap_or_default(),
                is_favorited: row.is_favorited,
                is_in_shopping_cart: row.is_in_shopping_cart,
                name: row.name,
                image: media.resolve(row.image),
                text: row.text,
                cooking_time: row.cooking_time,
            })
        })
        .collect()
}

pub async fn get_recipe_author(pool: &Pool<Postgres>, id: Id) -> Result<Option<Id>, Error> {
    let row: Option<(Id,)> = sqlx::query_as("SELECT author_id FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}

pub async fn get_short_recipe(
    pool: &Pool<Postgres>,
    media: &MediaStorage,
    id: Id,
) -> Result<Option<ShortRecipe>, Error> {
    let row: Option<ShortRecipe> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.map(|recipe| ShortRecipe {
        image: media.resolve(recipe.image),
        ..recipe
    }))
}

/// Rejects references to unknown tags or ingredients.
async fn check_references(pool: &Pool<Postgres>, changes: &RecipeChanges) -> Result<(), Error> {
    let ingredient_ids: Vec<Id> = changes.ingredients.iter().map(|(id, _)| *id).collect();
    let mut errors = FieldErrors::new();

    let missing = missing_ingredients(pool, &ingredient_ids).await?;
    if !missing.is_empty() {
        errors.insert(
            "ingredients".into(),
            missing
                .iter()
                .map(|id| format!("Invalid pk \"{id}\" - object does not exist."))
                .collect(),
        );
    }
    let missing = missing_tags(pool, &changes.tags).await?;
    if !missing.is_empty() {
        errors.insert(
            "tags".into(),
            missing
                .iter()
                .map(|id| format!("Invalid pk \"{id}\" - object does not exist."))
                .collect(),
        );
    }

    match errors.is_empty() {
        true => Ok(()),
        false => Err(Error::validation(errors)),
    }
}

/// Replaces every ingredient and tag link of a recipe.
async fn replace_links(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    changes: &RecipeChanges,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    builder.push_values(&changes.ingredients, |mut row, (ingredient_id, amount)| {
        row.push_bind(recipe_id)
            .push_bind(*ingredient_id)
            .push_bind(*amount);
    });
    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    builder.push_values(&changes.tags, |mut row, tag_id| {
        row.push_bind(recipe_id).push_bind(*tag_id);
    });
    builder
        .build()
        .execute(&mut **tx)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// `image` is the stored path of the already written image file.
pub async fn create_recipe(
    pool: &Pool<Postgres>,
    author_id: Id,
    changes: &RecipeChanges,
    image: &str,
) -> Result<Id, Error> {
    check_references(pool, changes).await?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let id: (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(changes.name.as_deref().map(str::trim))
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .bind(image)
    .fetch_one(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    replace_links(&mut tx, id.0, changes).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {author_id} created recipe {}", id.0);
    Ok(id.0)
}

/// Absent scalar fields keep their value. Returns the replaced image path, if any.
pub async fn update_recipe(
    pool: &Pool<Postgres>,
    id: Id,
    changes: &RecipeChanges,
    image: Option<&str>,
) -> Result<Option<String>, Error> {
    check_references(pool, changes).await?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let previous: Option<(Option<String>,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(QueryError::from)?;
    let previous = previous
        .ok_or_else(|| HtmlError::NotFound.default())?
        .0;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            cooking_time = COALESCE($3, cooking_time),
            image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(changes.name.as_deref().map(str::trim))
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tx)
    .await
    .map_err(QueryError::from)?;

    replace_links(&mut tx, id, changes).await?;
    tx.commit().await.map_err(QueryError::from)?;

    Ok(match image {
        Some(_) => previous,
        None => None,
    })
}

/// Returns the image path of the deleted recipe, `None` when nothing was deleted.
pub async fn delete_recipe(pool: &Pool<Postgres>, id: Id) -> Result<Option<Option<String>>, Error> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("DELETE FROM recipes WHERE id = $1 RETURNING image")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}
