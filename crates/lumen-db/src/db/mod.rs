//! Database repositories for data access layer

pub mod media;

pub use media::{InMemoryMediaRepository, MediaRecordStore, PgMediaRepository, UpsertOutcome};
