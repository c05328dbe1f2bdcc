use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::{
        subscriptions::{fetch_subscriptions, subscribe, unsubscribe},
        users::{fetch_users, get_user_profile, register_user, set_password},
    },
    constants::USER_COUNT_PER_PAGE,
    error::HtmlError,
    filters::QueryPairs,
    form::{RegisterForm, SetPasswordForm, ValidateForm},
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
    pagination::{PageContext, PageRequest},
    permissions::ActionType,
    schema::{CreatedUser, Id},
    state::{with_state, AppState},
};

use super::api::{json_body, no_content, reply_json, with_query};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    list_route(state.clone())
        .or(register_route(state.clone()))
        .or(me_route(state.clone()))
        .or(set_password_route(state.clone()))
        .or(subscriptions_route(state.clone()))
        .or(detail_route(state.clone()))
        .or(subscribe_route(state.clone()))
        .or(unsubscribe_route(state))
}

fn list_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users")
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_query())
        .and(with_state(state))
        .and_then(handle_list)
}

fn register_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state))
        .and_then(handle_register)
}

fn me_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handle_me)
}

fn set_password_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state))
        .and_then(handle_set_password)
}

fn subscriptions_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / "subscriptions")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_state(state))
        .and_then(handle_subscriptions)
}

fn detail_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state))
        .and_then(handle_detail)
}

fn subscribe_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / Id / "subscribe")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_query())
        .and(with_state(state))
        .and_then(handle_subscribe)
}

fn unsubscribe_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handle_unsubscribe)
}

async fn handle_list(
    session: Option<SessionData>,
    query: QueryPairs,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let page = PageRequest::from_query(&query, USER_COUNT_PER_PAGE)?;
    let viewer = session.map(|s| s.user_id);
    let (rows, total) = fetch_users(&state.pool, viewer, page).await?;

    Ok(reply_json(
        &PageContext::from_rows(rows, total, page, "/api/users/", &query),
        StatusCode::OK,
    ))
}

async fn handle_register(form: RegisterForm, state: AppState) -> Result<impl Reply, Rejection> {
    let form = form.validated()?;
    let user = register_user(&state.pool, &form).await?;

    Ok(reply_json(&CreatedUser::from(user), StatusCode::CREATED))
}

async fn handle_me(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    let profile = get_user_profile(&state.pool, Some(session.user_id), session.user_id)
        .await?
        .ok_or_else(|| HtmlError::InvalidSession.default())?;

    Ok(reply_json(&profile, StatusCode::OK))
}

async fn handle_set_password(
    session: SessionData,
    form: SetPasswordForm,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let form = form.validated()?;
    set_password(&state.pool, session.user_id, &form).await?;
    log::info!("User {} changed their password", session.user_id);

    Ok(no_content())
}

async fn handle_subscriptions(
    session: SessionData,
    query: QueryPairs,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let page = PageRequest::from_query(&query, USER_COUNT_PER_PAGE)?;
    let (rows, total) = fetch_subscriptions(
        &state.pool,
        &state.media,
        session.user_id,
        page,
        query.recipes_limit(),
    )
    .await?;

    Ok(reply_json(
        &PageContext::from_rows(rows, total, page, "/api/users/subscriptions/", &query),
        StatusCode::OK,
    ))
}

async fn handle_detail(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let profile = get_user_profile(&state.pool, session.map(|s| s.user_id), id)
        .await?
        .ok_or_else(|| HtmlError::NotFound.default())?;

    Ok(reply_json(&profile, StatusCode::OK))
}

async fn handle_subscribe(
    id: Id,
    session: SessionData,
    query: QueryPairs,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    let subscription = subscribe(
        &state.pool,
        &state.media,
        session.user_id,
        id,
        query.recipes_limit(),
    )
    .await?;
    log::info!("User {} subscribed to {id}", session.user_id);

    Ok(reply_json(&subscription, StatusCode::CREATED))
}

async fn handle_unsubscribe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    session.authenticate(ActionType::ManageOwnLists)?;
    unsubscribe(&state.pool, session.user_id, id).await?;
    log::info!("User {} unsubscribed from {id}", session.user_id);

    Ok(no_content())
}
