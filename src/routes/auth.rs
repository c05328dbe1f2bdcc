use warp::{http::StatusCode, reject::Rejection, Filter, Reply};

use crate::{
    actions::users::login_user,
    form::LoginForm,
    jwt::SessionData,
    middleware::with_session,
    revoke_token,
    state::{with_state, AppState},
};

use super::api::{json_body, no_content, reply_json};

pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    login_route(state.clone()).or(logout_route(state))
}

fn login_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state))
        .and_then(handle_login)
}

fn logout_route(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state))
        .and_then(handle_logout)
}

async fn handle_login(form: LoginForm, state: AppState) -> Result<impl Reply, Rejection> {
    let token = login_user(&state.pool, &state.signer, &form.email, &form.password).await?;

    Ok(reply_json(
        &serde_json::json!({ "auth_token": token }),
        StatusCode::OK,
    ))
}

async fn handle_logout(session: SessionData, state: AppState) -> Result<impl Reply, Rejection> {
    match state.cache.clone() {
        Some(mut cache) => {
            revoke_token(&session.token_id, session.remaining_lifetime(), &mut cache).await?;
            log::info!("User {} logged out", session.user_id);
        }
        None => log::warn!(
            "No cache configured, token of user {} stays valid until it expires",
            session.user_id
        ),
    }

    Ok(no_content())
}
