//! HTTP surface constants

/// Versioned prefix of every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Header carrying the shared secret.
pub const SECRET_HEADER: &str = "x-secret";

/// Header carrying a media access token.
pub const ACCESS_TOKEN_HEADER: &str = "x-media-access-token";

/// Cookie carrying a media access token when the header is absent.
pub const ACCESS_TOKEN_COOKIE: &str = "__media_access_token__";

/// Multipart framing allowance on top of the upload size limit.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Variants rendered at once; further reads wait for a slot.
pub const MAX_CONCURRENT_RENDERS: usize = 64;
