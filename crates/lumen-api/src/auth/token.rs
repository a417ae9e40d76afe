use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lumen_core::models::{parse_token_lifetime, AccessClaims, Permission};
use lumen_core::AppError;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

/// Signs and verifies media access tokens with the service secret.
#[derive(Clone)]
pub struct AccessTokens {
    secret: Arc<str>,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AccessClaims,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

impl AccessTokens {
    pub fn new(secret: &str) -> Self {
        Self {
            secret: Arc::from(secret),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Constant-time comparison against the shared secret.
    pub fn is_secret(&self, candidate: &str) -> bool {
        let expected = self.secret.as_bytes();
        let candidate = candidate.as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected.ct_eq(candidate).into()
    }

    /// Issue a token valid for `expires_in` (e.g. `30d`).
    pub fn issue(
        &self,
        permissions: Vec<Permission>,
        expires_in: &str,
    ) -> Result<IssuedToken, AppError> {
        let lifetime = parse_token_lifetime(expires_in).ok_or_else(|| {
            AppError::BadRequest(format!("expiresIn must be a valid duration: {}", expires_in))
        })?;

        let iat = unix_now();
        let claims = AccessClaims {
            permissions,
            iat,
            exp: iat.saturating_add(lifetime.as_secs()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("Failed to sign access token: {}", e)))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and expiry. `None` for anything that does not verify.
    pub fn verify(&self, token: &str) -> Option<AccessClaims> {
        match decode::<AccessClaims>(token, &self.decoding, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                tracing::debug!(error = %e, "Access token rejected");
                None
            }
        }
    }
}
