//! Lumen Storage Library
//!
//! Content-addressed storage for canonical masters.
//!
//! # Layout
//!
//! Media keys look like `{sha256}/{name}{ext}`, but the bytes live once per
//! digest at `{root}/{sha256}{ext}`; every key sharing a digest resolves to the
//! same file. Masters are written to `{root}/.staging/` first and published
//! with a no-clobber hard link (rename where links are unsupported), so a
//! master path never holds partial content.

pub mod digest;
pub mod keys;
pub mod local;
pub mod traits;

pub use digest::sha256_file;
pub use keys::{derive_key, parse_key, sanitize_file_name, ParsedKey};
pub use local::LocalMasterStore;
pub use traits::{MasterStore, Placement, StorageError, StorageResult};
