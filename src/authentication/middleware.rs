use warp::{reject::Rejection, Filter};

use crate::{
    error::{Error, HtmlError},
    is_token_revoked,
    jwt::SessionData,
    state::{with_state, AppState},
};

/// Accepts `Token <jwt>` and `Bearer <jwt>`.
fn extract_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    match scheme {
        "Token" | "Bearer" => Some(token),
        _ => None,
    }
}

async fn resolve_session(
    header: Option<String>,
    state: AppState,
) -> Result<Option<SessionData>, Error> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };
    let token = extract_token(&header)
        .ok_or_else(|| HtmlError::InvalidSession.new("Invalid token header."))?;
    let session = state.signer.verify_jwt_session(token)?;

    if let Some(mut cache) = state.cache.clone() {
        match is_token_revoked(&session.jti, &mut cache).await {
            Ok(true) => return Err(HtmlError::InvalidSession.new("Invalid token.")),
            Ok(false) => {}
            Err(e) => log::error!("Could not check revocation of {}: {e}", session.jti),
        }
    }

    Ok(Some(session.into()))
}

/// Anonymous requests pass through as `None`; a bad token is still rejected.
pub fn with_possible_session(
    state: AppState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            resolve_session(header, state)
                .await
                .map_err(Rejection::from)
        })
}

pub fn with_session(
    state: AppState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_possible_session(state).and_then(|session: Option<SessionData>| async move {
        session.ok_or_else(|| Rejection::from(HtmlError::Unauthorized.default()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authorization_schemes() {
        assert_eq!(extract_token("Token abc.def"), Some("abc.def"));
        assert_eq!(extract_token("Bearer abc.def "), Some("abc.def"));
        assert_eq!(extract_token("Basic dXNlcg=="), None);
        assert_eq!(extract_token("Token "), None);
        assert_eq!(extract_token("abc.def"), None);
    }
}
