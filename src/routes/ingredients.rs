use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::ingredients::{create_ingredient, get_ingredient, list_ingredients},
    error::HtmlError,
    filters::{IngredientFilter, QueryPairs},
    form::{IngredientForm, ValidateForm},
    get_or_fetch, invalidate,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::Id,
    state::{with_state, AppState},
    CacheKeyType, CacheLifetime,
};

use super::api::{json_body, reply_json, with_query};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("ingredients")
        .and(warp::get())
        .and(with_query())
        .and(with_state(state.clone()))
        .and_then(handle_list);

    let detail = warp::path!("ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_detail);

    let create = warp::path!("ingredients")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state))
        .and_then(handle_create);

    list.or(detail).or(create)
}

/// Only the unfiltered list is cached; prefix searches go to the database.
async fn handle_list(query: QueryPairs, state: AppState) -> Result<impl Reply, Rejection> {
    let filter = IngredientFilter::from_query(&query);
    let pool = &state.pool;

    let ingredients = match filter.name {
        Some(_) => list_ingredients(pool, &filter).await?,
        None => {
            get_or_fetch(
                CacheKeyType::IngredientList.new("all"),
                state.cache.clone(),
                || list_ingredients(pool, &filter),
            )
            .await?
        }
    };

    Ok(reply_json(&ingredients, StatusCode::OK))
}

async fn handle_detail(id: Id, state: AppState) -> Result<impl Reply, Rejection> {
    let ingredient = get_ingredient(&state.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(reply_json(&ingredient, StatusCode::OK))
}

async fn handle_create(
    session: SessionData,
    form: IngredientForm,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let form = form.validated()?;

    let ingredient = create_ingredient(&state.pool, &form).await?;
    invalidate(CacheLifetime::BindIngredientCache, state.cache.clone()).await;
    log::info!(
        "User {} created ingredient {} ({})",
        session.user_id,
        ingredient.id,
        ingredient.name
    );

    Ok(reply_json(&ingredient, StatusCode::CREATED))
}
