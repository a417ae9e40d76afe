//! Capability checks
//!
//! A request is authorized either by the shared secret or by an HS256 access
//! token listing the permissions the route needs.

pub mod middleware;
pub mod token;

pub use middleware::{require_delete, require_secret, require_write};
pub use token::{AccessTokens, IssuedToken};
