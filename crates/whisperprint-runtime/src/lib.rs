//! Runtime orchestrator: coordinates the WhisperPrint operations.
//!
//! Fingerprinting and identification go through the watermark codec and the
//! recipient registry; privacy checks go through the guardian detector and
//! risk scorer. Every completed operation is published on the event bus.

pub mod events;
pub mod matcher;
pub mod orchestrator;
pub mod types;

pub use events::{Event, EventBus, EventType};
pub use matcher::Matcher;
pub use orchestrator::Orchestrator;
pub use types::*;
