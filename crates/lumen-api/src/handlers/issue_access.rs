use axum::{extract::State, Json};
use lumen_core::models::Permission;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use validator::Validate;

use crate::constants::{ACCESS_TOKEN_COOKIE, ACCESS_TOKEN_HEADER};
use crate::error::HttpAppError;
use crate::state::AppState;

static EXPIRES_IN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[smhdy]$").expect("expiresIn pattern compiles"));

const ISSUED_PERMISSIONS: [Permission; 2] = [Permission::Write, Permission::Read];

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct IssueAccessRequest {
    #[validate(regex(path = *EXPIRES_IN, message = "expiresIn must be a valid duration"))]
    pub expires_in: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenKeys {
    pub header: &'static str,
    pub cookie: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueAccessResponse {
    pub token: String,
    pub expires_in: String,
    pub permissions: Vec<Permission>,
    pub keys: TokenKeys,
}

/// Mint a write/read token. Gated on the shared secret by the router.
#[tracing::instrument(skip(state, body), fields(operation = "issue_access"))]
pub async fn issue_access(
    State(state): State<AppState>,
    body: Option<Json<IssueAccessRequest>>,
) -> Result<Json<IssueAccessResponse>, HttpAppError> {
    let request = body
        .map(|Json(request)| request)
        .unwrap_or(IssueAccessRequest { expires_in: None });
    request.validate().map_err(lumen_core::AppError::from)?;

    let expires_in = request
        .expires_in
        .unwrap_or_else(|| state.config.access_token_expiry.clone());
    let issued = state
        .tokens
        .issue(ISSUED_PERMISSIONS.to_vec(), &expires_in)?;

    tracing::info!(expires_in = %expires_in, exp = issued.claims.exp, "Access token issued");

    Ok(Json(IssueAccessResponse {
        token: issued.token,
        expires_in,
        permissions: issued.claims.permissions,
        keys: TokenKeys {
            header: ACCESS_TOKEN_HEADER,
            cookie: ACCESS_TOKEN_COOKIE,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_in_pattern() {
        for ok in ["1y", "30d", "12h", "15m", "90s"] {
            let req = IssueAccessRequest {
                expires_in: Some(ok.to_string()),
            };
            assert!(req.validate().is_ok(), "{ok}");
        }
        for bad in ["1w", "d", "1.5h", " 1d", "-1d"] {
            let req = IssueAccessRequest {
                expires_in: Some(bad.to_string()),
            };
            assert!(req.validate().is_err(), "{bad}");
        }
        assert!(IssueAccessRequest { expires_in: None }.validate().is_ok());
    }
}
