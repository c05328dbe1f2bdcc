use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::tags::{create_tag, get_tag, list_tags},
    error::HtmlError,
    form::{TagForm, ValidateForm},
    get_or_fetch, invalidate,
    jwt::SessionData,
    middleware::with_session,
    permissions::ActionType,
    schema::Id,
    state::{with_state, AppState},
    CacheKeyType, CacheLifetime,
};

use super::api::{json_body, reply_json};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list);

    let detail = warp::path!("tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_detail);

    let create = warp::path!("tags")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state))
        .and_then(handle_create);

    list.or(detail).or(create)
}

async fn handle_list(state: AppState) -> Result<impl Reply, Rejection> {
    let pool = &state.pool;
    let tags = get_or_fetch(CacheKeyType::TagList.new("all"), state.cache.clone(), || {
        list_tags(pool)
    })
    .await?;

    Ok(reply_json(&tags, StatusCode::OK))
}

async fn handle_detail(id: Id, state: AppState) -> Result<impl Reply, Rejection> {
    let tag = get_tag(&state.pool, id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(reply_json(&tag, StatusCode::OK))
}

async fn handle_create(
    session: SessionData,
    form: TagForm,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageTags)?;
    let form = form.validated()?;

    let tag = create_tag(&state.pool, &form).await?;
    invalidate(CacheLifetime::BindTagCache, state.cache.clone()).await;
    log::info!("User {} created tag {} ({})", session.user_id, tag.id, tag.slug);

    Ok(reply_json(&tag, StatusCode::CREATED))
}
