use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, FieldErrors, QueryError},
    form::TagForm,
    schema::{Id, Tag},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_tag(pool: &Pool<Postgres>, id: Id) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Ids among `ids` that name no tag.
pub async fn missing_tags(pool: &Pool<Postgres>, ids: &[Id]) -> Result<Vec<Id>, Error> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
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

/// Colors compare case-insensitively, so `#FF0000` and `#ff0000` collide.
pub async fn create_tag(pool: &Pool<Postgres>, form: &TagForm) -> Result<Tag, Error> {
    let taken: Vec<(bool, bool, bool)> = sqlx::query_as(
        "
        SELECT name = $1, LOWER(color) = LOWER($2), slug = $3 FROM tags
        WHERE name = $1 OR LOWER(color) = LOWER($2) OR slug = $3
    ",
    )
    .bind(form.name.trim())
    .bind(&form.color)
    .bind(&form.slug)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    for (field, clash) in [
        ("name", taken.iter().any(|t| t.0)),
        ("color", taken.iter().any(|t| t.1)),
        ("slug", taken.iter().any(|t| t.2)),
    ] {
        if clash {
            errors.insert(
                field.into(),
                vec![format!("A tag with this {field} already exists.")],
            );
        }
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    let tag: Option<Tag> = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING RETURNING *",
    )
    .bind(form.name.trim())
    .bind(form.color.to_uppercase())
    .bind(&form.slug)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    tag.ok_or_else(|| Error::field("name", "A tag with this name already exists."))
}
