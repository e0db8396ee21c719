use actix_web::{http::header, HttpRequest};
use log::info;

use super::error::ApiError;
use crate::identity::Identity;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";

// Authorization: Bearer TOKEN, falling back to the session cookie.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    from_header.or_else(|| {
        req.cookie(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_owned())
    })
}

pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<Identity, ApiError> {
    let Some(token) = bearer_token(req) else {
        info!("Authorization header is missing for {}", req.path());
        return Err(ApiError::Unauthenticated("Authorization failed!".to_owned()));
    };
    Ok(state.auth.authenticate(&token).await?)
}
