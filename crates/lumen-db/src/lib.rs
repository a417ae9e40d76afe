//! Lumen record store
//!
//! Persists media keys. The store is append-mostly: a key is created once by
//! the first ingest that produces it and only disappears on delete.

pub mod db;

pub use db::{InMemoryMediaRepository, MediaRecordStore, PgMediaRepository, UpsertOutcome};
