use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    constants::IMPORT_BATCH_SIZE,
    error::{Error, QueryError},
    filters::IngredientFilter,
    form::IngredientForm,
    schema::{Id, Ingredient},
};

pub async fn list_ingredients(
    pool: &Pool<Postgres>,
    filter: &IngredientFilter,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = match filter.like_pattern() {
        Some(pattern) => sqlx::query_as(
            "SELECT * FROM ingredients WHERE name LIKE $1 ESCAPE '\\' ORDER BY name, id",
        )
        .bind(pattern)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name, id")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn get_ingredient(pool: &Pool<Postgres>, id: Id) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Ids among `ids` that name no ingredient.
pub async fn missing_ingredients(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(ids
        .iter()
        .copied()
        .filter(|id| !found.iter().any(|(found,)| found == id))
        .collect())
}

pub async fn create_ingredient(
    pool: &Pool<Postgres>,
    form: &IngredientForm,
) -> Result<Ingredient, Error> {
    let row: Ingredient = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING *",
    )
    .bind(form.name.trim())
    .bind(form.measurement_unit.trim())
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

/// Inserts every entry in one transaction, in batches. Returns the number of rows written.
pub async fn import_ingredients(
    pool: &Pool<Postgres>,
    entries: &[IngredientForm],
) -> Result<u64, Error> {
    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let mut inserted = 0;

    for batch in entries.chunks(IMPORT_BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");
        builder.push_values(batch, |mut row, entry| {
            row.push_bind(entry.name.trim())
                .push_bind(entry.measurement_unit.trim());
        });

        let result = builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
        log::trace!("> Imported batch of {}", batch.len());
    }

    tx.commit().await.map_err(QueryError::from)?;
    Ok(inserted)
}
