pub mod delivery;
pub mod ingest;
pub mod library;

pub use delivery::{MediaDelivery, RenderedMedia};
pub use ingest::IngestionCoordinator;
pub use library::MediaLibrary;
