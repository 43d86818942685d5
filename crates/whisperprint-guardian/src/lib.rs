//! Privacy guardian: sensitive-data detection and disclosure risk scoring.
//!
//! Independent recognizers (structured PII, credentials, named entities,
//! sensitive topics) each emit typed, located, confidence-scored detections
//! with masked values.
//! The detector merges them and the risk scorer turns the set into a score
//! and a safe/review/block recommendation.

pub mod detection;
pub mod entities;
pub mod mask;
pub mod pii;
pub mod risk;
pub mod secrets;
pub mod topics;

pub use detection::{Detection, DetectionType, Detector, Recognizer, Span};
pub use mask::{mask, MaskStyle};
pub use risk::{Assessment, Recommendation, RiskConfig, RiskScorer};
