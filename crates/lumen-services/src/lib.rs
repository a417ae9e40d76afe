//! Lumen services layer
//!
//! Ties the master store, the record store and the transform pipeline
//! together: ingestion of uploads into content-addressed masters, rendering of
//! variants on read, and deletion.

pub mod services;

pub use services::{IngestionCoordinator, MediaDelivery, MediaLibrary, RenderedMedia};
