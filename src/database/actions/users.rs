use sqlx::{Pool, Postgres};

use crate::{
    cryptography::{hash_password, verify_password},
    error::{Error, FieldErrors, HtmlError, QueryError},
    form::{RegisterForm, SetPasswordForm},
    jwt::TokenSigner,
    pagination::PageRequest,
    schema::{Id, User, UserProfile, UserProfileRow},
};

/// Columns of a [`UserProfile`] over `users u`, as seen by the user bound to `$1`.
pub(crate) const PROFILE_COLUMNS: &str = "
    u.email, u.id, u.username, u.first_name, u.last_name,
    EXISTS (
        SELECT 1 FROM subscriptions s
        WHERE s.subscriber_id = $1 AND s.subscribed_to_id = u.id
    ) AS is_subscribed";

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn user_exists(pool: &Pool<Postgres>, user_id: Id) -> Result<bool, Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row.0)
}

/// Creates a user from an already validated form. The password is stored as an argon2 hash.
pub async fn register_user(pool: &Pool<Postgres>, form: &RegisterForm) -> Result<User, Error> {
    let taken: Vec<(bool, bool)> = sqlx::query_as(
        "SELECT email = $1, username = $2 FROM users WHERE email = $1 OR username = $2",
    )
    .bind(&form.email)
    .bind(&form.username)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut errors = FieldErrors::new();
    if taken.iter().any(|(email, _)| *email) {
        errors.insert(
            "email".into(),
            vec!["A user with that email already exists.".into()],
        );
    }
    if taken.iter().any(|(_, username)| *username) {
        errors.insert(
            "username".into(),
            vec!["A user with that username already exists.".into()],
        );
    }
    if !errors.is_empty() {
        return Err(Error::validation(errors));
    }

    let password = hash_password(&form.password)?;
    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(&form.email)
    .bind(&form.username)
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(password)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    // Lost a race against a concurrent registration.
    let user = user.ok_or_else(|| {
        Error::field("username", "A user with that username already exists.")
    })?;
    log::info!("Registered user {} ({})", user.id, user.username);

    Ok(user)
}

pub async fn login_user(
    pool: &Pool<Postgres>,
    signer: &TokenSigner,
    email: &str,
    password: &str,
) -> Result<String, Error> {
    let invalid = || {
        Error::field(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        )
    };

    let user = get_user_by_email(pool, email).await?.ok_or_else(invalid)?;
    if !verify_password(password, &user.password)? {
        return Err(invalid());
    }

    signer.generate_jwt_session(&user)
}

pub async fn set_password(
    pool: &Pool<Postgres>,
    user_id: Id,
    form: &SetPasswordForm,
) -> Result<(), Error> {
    let user = get_user_by_id(pool, user_id)
        .await?
        .ok_or_else(|| HtmlError::InvalidSession.default())?;

    if !verify_password(&form.current_password, &user.password)? {
        return Err(Error::field("current_password", "Invalid password."));
    }

    let password = hash_password(&form.new_password)?;
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn get_user_profile(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    user_id: Id,
) -> Result<Option<UserProfile>, Error> {
    let row: Option<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = $2"))
            .bind(viewer)
            .bind(user_id)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_user_profiles(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    ids: &[Id],
) -> Result<Vec<UserProfile>, Error> {
    let rows: Vec<UserProfile> =
        sqlx::query_as(&format!("SELECT {PROFILE_COLUMNS} FROM users u WHERE u.id = ANY($2)"))
            .bind(viewer)
            .bind(ids)
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(rows)
}

/// Newest users first.
pub async fn fetch_users(
    pool: &Pool<Postgres>,
    viewer: Option<Id>,
    page: PageRequest,
) -> Result<(Vec<UserProfile>, i64), Error> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(&format!(
        "SELECT {PROFILE_COLUMNS}, COUNT(*) OVER() AS count FROM users u ORDER BY u.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(viewer)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    page.check_rows(rows.len())?;
    let total_count = rows.first().map(|row| row.count).unwrap_or(0);

    Ok((rows.into_iter().map(|row| row.profile).collect(), total_count))
}
