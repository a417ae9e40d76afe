use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lumen_core::models::Permission;
use lumen_core::AppError;

use crate::auth::AccessTokens;
use crate::constants::{ACCESS_TOKEN_COOKIE, ACCESS_TOKEN_HEADER, SECRET_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Access token from the header, falling back to the cookie.
fn access_token(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, ACCESS_TOKEN_HEADER)
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

pub fn has_secret(tokens: &AccessTokens, headers: &HeaderMap) -> bool {
    header_str(headers, SECRET_HEADER).is_some_and(|s| tokens.is_secret(s))
}

/// Whether the request may perform an operation needing `required`.
pub fn authorize(tokens: &AccessTokens, headers: &HeaderMap, required: &[Permission]) -> bool {
    if has_secret(tokens, headers) {
        return true;
    }
    access_token(headers)
        .and_then(|token| tokens.verify(token))
        .is_some_and(|claims| claims.allows(required))
}

fn denied(required: &[Permission]) -> Response {
    tracing::debug!(required = ?required, "Permission denied");
    HttpAppError(AppError::Unauthorized("Permission denied".to_string())).into_response()
}

async fn require(state: &AppState, required: &[Permission], request: Request, next: Next) -> Response {
    if authorize(&state.tokens, request.headers(), required) {
        next.run(request).await
    } else {
        denied(required)
    }
}

pub async fn require_write(State(state): State<AppState>, request: Request, next: Next) -> Response {
    require(&state, &[Permission::Write], request, next).await
}

pub async fn require_delete(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    require(&state, &[Permission::Delete], request, next).await
}

/// Only the shared secret is accepted; tokens cannot mint tokens.
pub async fn require_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if has_secret(&state.tokens, request.headers()) {
        next.run(request).await
    } else {
        denied(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_secret_grants_everything() {
        let tokens = AccessTokens::new(SECRET);
        let h = headers(&[(SECRET_HEADER, SECRET)]);
        assert!(authorize(&tokens, &h, &[Permission::Delete, Permission::Write]));
    }

    #[test]
    fn test_token_needs_every_permission() {
        let tokens = AccessTokens::new(SECRET);
        let issued = tokens
            .issue(vec![Permission::Write, Permission::Read], "1h")
            .unwrap();
        let h = headers(&[(ACCESS_TOKEN_HEADER, &issued.token)]);

        assert!(authorize(&tokens, &h, &[Permission::Write]));
        assert!(!authorize(&tokens, &h, &[Permission::Write, Permission::Delete]));
    }

    #[test]
    fn test_token_from_cookie() {
        let tokens = AccessTokens::new(SECRET);
        let issued = tokens.issue(vec![Permission::Delete], "1h").unwrap();
        let cookie = format!("theme=dark; {}={}", ACCESS_TOKEN_COOKIE, issued.token);
        let h = headers(&[("cookie", &cookie)]);

        assert!(authorize(&tokens, &h, &[Permission::Delete]));
    }

    #[test]
    fn test_nothing_presented_is_denied() {
        let tokens = AccessTokens::new(SECRET);
        assert!(!authorize(&tokens, &HeaderMap::new(), &[Permission::Read]));
        let wrong = headers(&[(SECRET_HEADER, "nope")]);
        assert!(!authorize(&tokens, &wrong, &[Permission::Read]));
    }
}
