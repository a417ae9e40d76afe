mod memory;
mod repository;
mod store;

pub use memory::InMemoryMediaRepository;
pub use repository::PgMediaRepository;
pub use store::{MediaRecordStore, UpsertOutcome};
