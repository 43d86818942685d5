//! Request and response types for the runtime operations.
//!
//! Field names are the wire names the clients send and expect.

use serde::{Deserialize, Serialize};
use whisperprint_guardian::{Detection, Recommendation};

fn default_content_type() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct FingerprintRequest {
    pub text: String,
    pub recipient_id: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintResponse {
    pub tracking_id: String,
    pub recipient_uuid: String,
    pub fingerprinted_text: String,
}

/// An uploaded file to fingerprint.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub recipient_id: String,
    /// Keep the upload's name and type in the fingerprint record.
    pub preserve_metadata: bool,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FingerprintedFile {
    pub url: String,
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FingerprintFileResponse {
    pub tracking_id: String,
    pub recipient_uuid: String,
    pub fingerprinted_file: FingerprintedFile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentifyRequest {
    pub leaked_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentifyResponse {
    pub recipient_id: Option<String>,
    pub confidence: f64,
    pub metadata: Option<MatchMetadata>,
}

impl IdentifyResponse {
    pub fn no_match(confidence: f64) -> Self {
        Self {
            recipient_id: None,
            confidence,
            metadata: None,
        }
    }
}

/// Supporting detail for a positive identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchMetadata {
    pub recipient_uuid: String,
    pub registered_at: chrono::DateTime<chrono::Utc>,
    pub fingerprint_count: usize,
    /// Fingerprint records whose carrier text had the decoded visible length.
    pub candidate_tracking_ids: Vec<String>,
    pub copies_recovered: usize,
    pub copies_expected: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    pub content: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CheckRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: default_content_type(),
            metadata: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    pub tracking_id: String,
    pub has_sensitive_data: bool,
    pub risk_score: f64,
    pub recommendation: Recommendation,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub detection_id: String,
    pub action: String,
    pub was_correct: bool,
    #[serde(default)]
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub status: &'static str,
    pub tracking_id: String,
}

/// Actions a reviewer may record against a detection.
pub const FEEDBACK_ACTIONS: &[&str] = &["safe", "review", "block", "redact", "ignore", "report"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_request_defaults_to_text() {
        let req: CheckRequest = serde_json::from_str(r#"{"content": "hi"}"#).unwrap();
        assert_eq!(req.content_type, "text");
        assert!(req.metadata.is_none());
    }

    #[test]
    fn test_no_match_serializes_nulls() {
        let json = serde_json::to_value(IdentifyResponse::no_match(0.2)).unwrap();
        assert!(json["recipient_id"].is_null());
        assert!(json["metadata"].is_null());
        assert_eq!(json["confidence"], 0.2);
    }
}
