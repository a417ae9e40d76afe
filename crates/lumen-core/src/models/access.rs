use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capabilities carried by an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Delete,
}

/// Claims of a media access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub permissions: Vec<Permission>,
    pub iat: u64,
    pub exp: u64,
}

impl AccessClaims {
    pub fn allows(&self, required: &[Permission]) -> bool {
        required.iter().all(|p| self.permissions.contains(p))
    }
}

/// Parse a lifetime such as `30s`, `15m`, `12h`, `7d` or `1y`.
pub fn parse_token_lifetime(value: &str) -> Option<Duration> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let amount: u64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    let seconds = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        'y' => 365 * 24 * 60 * 60,
        _ => return None,
    };
    amount.checked_mul(seconds).map(Duration::from_secs)
}
