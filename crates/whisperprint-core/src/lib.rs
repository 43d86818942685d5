//! WhisperPrint Core: error type, configuration, data directory layout.

pub mod config;
pub mod error;

pub use config::{CodecSettings, DataPaths, WhisperPrintConfig};
pub use error::{require_non_empty, Error, Result};
