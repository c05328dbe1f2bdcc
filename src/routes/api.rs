use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use warp::{
    filters::BoxedFilter,
    http::StatusCode,
    reject::Rejection,
    reply::{json, with_status, Json, WithStatus},
    Filter, Reply,
};

use crate::{
    constants::MAX_REQUEST_BODY_BYTES,
    error::{Error, HtmlError},
    filters::QueryPairs,
    state::AppState,
};

use super::{auth, ingredients, recipes, tags, users};

/// The whole service: `/api/...`, uploaded media, JSON error rendering and request logging.
pub fn routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let api = warp::path("api").and(
        auth::routes(state.clone())
            .or(users::routes(state.clone()))
            .or(tags::routes(state.clone()))
            .or(ingredients::routes(state.clone()))
            .or(recipes::routes(state.clone())),
    );

    let media = media_prefix(&state.config.media_url)
        .and(warp::get())
        .and(warp::fs::dir(state.media.root().to_path_buf()));

    api.or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::requests"))
}

/// Path filter for the public media URL, e.g. `/media/` or `/static/uploads/`.
fn media_prefix(url: &str) -> BoxedFilter<()> {
    url.split('/')
        .filter(|segment| !segment.is_empty())
        .fold(warp::any().boxed(), |filter, segment| {
            filter.and(warp::path(segment.to_string())).boxed()
        })
}

pub(crate) fn with_query() -> impl Filter<Extract = (QueryPairs,), Error = Rejection> + Clone {
    warp::query::<Vec<(String, String)>>().map(QueryPairs::new)
}

pub(crate) fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_REQUEST_BODY_BYTES).and(warp::body::json())
}

pub(crate) fn reply_json<T: Serialize>(value: &T, status: StatusCode) -> WithStatus<Json> {
    with_status(json(value), status)
}

pub(crate) fn no_content() -> WithStatus<impl Reply> {
    with_status(warp::reply(), StatusCode::NO_CONTENT)
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let error = if let Some(error) = err.find::<Error>() {
        error.clone()
    } else if err.is_not_found() {
        HtmlError::NotFound.default()
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        HtmlError::InvalidRequest.new(&format!("JSON parse error - {e}"))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        HtmlError::InvalidRequest.new("Invalid query string.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        Error {
            code: StatusCode::METHOD_NOT_ALLOWED,
            info: Some("Method not allowed.".into()),
            fields: None,
        }
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        Error {
            code: StatusCode::PAYLOAD_TOO_LARGE,
            info: Some("Request body is too large.".into()),
            fields: None,
        }
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        Error {
            code: StatusCode::UNSUPPORTED_MEDIA_TYPE,
            info: Some("Unsupported media type.".into()),
            fields: None,
        }
    } else {
        log::error!("Unhandled rejection: {err:?}");
        HtmlError::InternalServerError.default()
    };

    if error.code.is_server_error() {
        log::error!("{error}");
    }

    Ok(reply_json(&error.body(), error.code))
}
