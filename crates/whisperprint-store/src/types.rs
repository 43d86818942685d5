//! Row types for recipients, fingerprint records and activity logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A registered recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub recipient_id: String,
    pub uuid: String,
    pub registered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Recipient {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// One fingerprint call. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FingerprintRecord {
    pub tracking_id: String,
    pub recipient_uuid: String,
    /// SHA-256 hex of the visible (pre-watermark) text.
    pub content_digest: String,
    /// Visible character count of the text the watermark was embedded in.
    pub visible_length: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Options for recording a fingerprint.
#[derive(Debug, Clone, Default)]
pub struct NewFingerprint {
    pub content_digest: String,
    pub visible_length: u32,
    pub metadata: Option<serde_json::Value>,
}

/// Summary of one privacy check. Holds counts, never content.
#[derive(Debug, Clone, Default)]
pub struct NewCheck {
    pub tracking_id: String,
    pub risk_score: f64,
    pub recommendation: String,
    pub content_type: String,
    /// Detection counts keyed by wire type name (e.g. `SSN`).
    pub detection_types: BTreeMap<String, u32>,
}

/// A stored feedback entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub detection_id: String,
    pub action: String,
    pub was_correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A persisted event from the activity stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: i64,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Counters for `/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub fingerprinted_documents: i64,
    pub total_recipients: i64,
    pub content_checks: i64,
    pub identified_leaks: i64,
    pub feedback_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayCount {
    pub date: String,
    pub count: i64,
}

/// Aggregates for `/analytics`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analytics {
    pub total_documents: i64,
    pub total_recipients: i64,
    pub documents_by_day: Vec<DayCount>,
    pub detections_by_type: BTreeMap<String, i64>,
    /// Check counts per risk quartile: `0-25%`, `25-50%`, `50-75%`, `75-100%`.
    pub risk_score_distribution: BTreeMap<String, i64>,
}

/// Result of `RegistryStore::integrity_check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub ok: bool,
    /// Output of `PRAGMA integrity_check`.
    pub sqlite: String,
    pub recipients: i64,
    pub revoked_recipients: i64,
    pub fingerprints: i64,
    /// Fingerprint records whose recipient row is missing.
    pub orphan_fingerprints: i64,
    pub audit_events: i64,
}

/// Quartile label for a risk score in `[0, 1]`.
pub fn risk_bucket(score: f64) -> &'static str {
    if score < 0.25 {
        "0-25%"
    } else if score < 0.5 {
        "25-50%"
    } else if score < 0.75 {
        "50-75%"
    } else {
        "75-100%"
    }
}
