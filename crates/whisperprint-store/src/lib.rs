//! WhisperPrint Store: SQLite recipient registry, fingerprint records, audit log.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::RegistryStore;
pub use types::*;
