//! Lumen Core Library
//!
//! Domain models, the error taxonomy and process configuration shared by every
//! Lumen crate.

pub mod config;
pub mod error;
pub mod models;
pub mod task_error;

pub use config::{Config, LogFormat};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use task_error::{TaskError, TaskResultExt};
