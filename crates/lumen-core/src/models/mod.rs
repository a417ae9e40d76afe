//! Data models for the application

mod access;
mod media;
mod transform;

pub use access::*;
pub use media::*;
pub use transform::*;
