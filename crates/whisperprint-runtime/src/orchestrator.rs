//! Orchestrator: runs the fingerprint, identify, check and feedback
//! operations over an explicitly passed registry.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;
use whisperprint_codec::Codec;
use whisperprint_core::{require_non_empty, Error, Result, WhisperPrintConfig};
use whisperprint_guardian::{Detection, Detector, RiskConfig, RiskScorer, Span};
use whisperprint_store::{NewCheck, NewFingerprint, RegistryStats, RegistryStore};

use crate::events::{EventBus, EventType};
use crate::matcher::Matcher;
use crate::types::*;

/// Top-level coordinator. Holds only pure components and the event bus;
/// all persistent state lives in the `RegistryStore` passed to each call.
pub struct Orchestrator {
    codec: Codec,
    detector: Detector,
    scorer: RiskScorer,
    matcher: Matcher,
    events: EventBus,
    output_dir: PathBuf,
}

struct Fingerprinted {
    tracking_id: String,
    recipient_uuid: String,
    text: String,
}

impl Orchestrator {
    pub fn new(config: &WhisperPrintConfig) -> Self {
        let risk = RiskConfig::load(&config.data_paths.risk_config_file);
        let orchestrator = Self {
            codec: Codec::from_settings(&config.codec),
            detector: Detector::with_defaults(),
            scorer: RiskScorer::new(risk),
            matcher: Matcher::new(config.match_threshold),
            events: EventBus::new(),
            output_dir: config.data_paths.fingerprinted.clone(),
        };
        info!(
            "Orchestrator initialized: redundancy={}, match_threshold={}, recognizers={}",
            orchestrator.codec.redundancy(),
            orchestrator.matcher.threshold(),
            orchestrator.detector.kinds().len()
        );
        orchestrator
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Directory fingerprinted files are written under, one subdirectory per tracking id.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Embed the recipient's watermark into `text`.
    pub fn fingerprint(
        &self,
        store: &RegistryStore,
        req: &FingerprintRequest,
    ) -> Result<FingerprintResponse> {
        require_non_empty("text", &req.text)?;
        require_non_empty("recipient_id", &req.recipient_id)?;

        let recipient_id = req.recipient_id.trim();
        let done = self.fingerprint_text(store, &req.text, recipient_id, req.metadata.clone())?;
        self.events.publish(
            store,
            EventType::DocumentFingerprinted,
            json!({
                "tracking_id": done.tracking_id,
                "recipient_id": recipient_id,
                "source": "text",
            }),
        );

        Ok(FingerprintResponse {
            tracking_id: done.tracking_id,
            recipient_uuid: done.recipient_uuid,
            fingerprinted_text: done.text,
        })
    }

    /// Fingerprint an uploaded file and write the result under the output directory.
    pub fn fingerprint_file(
        &self,
        store: &RegistryStore,
        upload: &FileUpload,
    ) -> Result<FingerprintFileResponse> {
        require_non_empty("recipient_id", &upload.recipient_id)?;
        if upload.bytes.is_empty() {
            return Err(Error::Validation("file must not be empty".into()));
        }

        let extracted = whisperprint_ingest::extract_text(&upload.filename, &upload.bytes)?;
        require_non_empty("file text", &extracted.text)?;

        let mut metadata = match upload.metadata.clone() {
            Some(serde_json::Value::Object(map)) => map,
            Some(serde_json::Value::Null) | None => serde_json::Map::new(),
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("metadata".into(), other);
                map
            }
        };
        if upload.preserve_metadata {
            metadata.insert("original_filename".into(), json!(upload.filename));
            metadata.insert("file_type".into(), json!(extracted.file_type));
        }
        let metadata = (!metadata.is_empty()).then(|| serde_json::Value::Object(metadata));

        let recipient_id = upload.recipient_id.trim();
        let done = self.fingerprint_text(store, &extracted.text, recipient_id, metadata)?;

        let rendered = whisperprint_ingest::render_fingerprinted(
            &upload.filename,
            extracted.file_type,
            &done.text,
        )?;
        let dir = self.output_dir.join(&done.tracking_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&rendered.filename), &rendered.bytes)?;
        debug!(
            "Wrote fingerprinted {} ({} bytes) for {}",
            rendered.filename,
            rendered.bytes.len(),
            done.tracking_id
        );

        self.events.publish(
            store,
            EventType::DocumentFingerprinted,
            json!({
                "tracking_id": done.tracking_id,
                "recipient_id": recipient_id,
                "source": "file",
                "filename": rendered.filename,
            }),
        );

        Ok(FingerprintFileResponse {
            fingerprinted_file: FingerprintedFile {
                url: format!("/files/fingerprinted/{}/{}", done.tracking_id, rendered.filename),
                filename: rendered.filename,
            },
            tracking_id: done.tracking_id,
            recipient_uuid: done.recipient_uuid,
        })
    }

    fn fingerprint_text(
        &self,
        store: &RegistryStore,
        text: &str,
        recipient_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Fingerprinted> {
        let recipient_uuid = store.register(recipient_id)?;
        let uuid = Uuid::parse_str(&recipient_uuid)
            .map_err(|e| {
                Error::Internal(format!("Stored uuid {} is invalid: {}", recipient_uuid, e))
            })?;

        let visible = whisperprint_codec::strip(text);
        let visible_length = u32::try_from(visible.chars().count()).unwrap_or(u32::MAX);
        let content_digest = hex::encode(Sha256::digest(visible.as_bytes()));

        let fingerprinted = self.codec.encode(text, &uuid);
        let tracking_id = store.record_fingerprint(
            &recipient_uuid,
            NewFingerprint {
                content_digest,
                visible_length,
                metadata,
            },
        )?;
        debug!(
            "Fingerprinted {} visible chars for {} as {}",
            visible_length, recipient_uuid, tracking_id
        );

        Ok(Fingerprinted {
            tracking_id,
            recipient_uuid,
            text: fingerprinted,
        })
    }

    /// Attribute a leaked excerpt to a recipient. Never fabricates a match.
    pub fn identify(
        &self,
        store: &RegistryStore,
        req: &IdentifyRequest,
    ) -> Result<IdentifyResponse> {
        require_non_empty("leaked_text", &req.leaked_text)?;

        let decoded = self.codec.decode(&req.leaked_text);
        let result = self.matcher.resolve(store, &decoded)?;
        let matched_uuid = result.metadata.as_ref().map(|m| m.recipient_uuid.as_str());
        store.record_identification(matched_uuid, result.confidence)?;

        debug!(
            "Identify: matched={}, confidence={:.3}, copies={}/{:.2}",
            result.recipient_id.is_some(),
            result.confidence,
            decoded.copies_recovered,
            decoded.copies_expected
        );
        self.events.publish(
            store,
            EventType::DocumentIdentified,
            json!({
                "matched": result.recipient_id.is_some(),
                "recipient_id": result.recipient_id,
                "confidence": result.confidence,
            }),
        );
        Ok(result)
    }

    /// Scan content for sensitive data and score the disclosure risk.
    ///
    /// Watermark frames are removed before scanning so fingerprinted
    /// documents are checked like their plain text; locations are char
    /// offsets into the content as sent. Deterministic apart from the fresh
    /// `tracking_id`. Only per-type detection counts are persisted.
    pub fn check(&self, store: &RegistryStore, req: &CheckRequest) -> Result<CheckResponse> {
        require_non_empty("content", &req.content)?;
        let content_type = match req.content_type.trim() {
            "" => "text".to_string(),
            other => other.to_lowercase(),
        };

        let (visible, positions) = whisperprint_codec::strip_indexed(&req.content);
        let content_digest = Sha256::digest(visible.as_bytes());
        let detections: Vec<Detection> = self
            .detector
            .detect_chars(&visible)
            .into_iter()
            .map(|mut d| {
                d.span = caller_span(d.span, &positions);
                d.id = detection_id(&content_digest, &d);
                d
            })
            .collect();
        let assessment = self.scorer.assess(&detections, &content_type);
        let tracking_id = Uuid::new_v4().to_string();

        let mut detection_types: BTreeMap<String, u32> = BTreeMap::new();
        for d in &detections {
            *detection_types.entry(d.kind.label().to_string()).or_default() += 1;
        }
        store.record_check(&NewCheck {
            tracking_id: tracking_id.clone(),
            risk_score: assessment.risk_score,
            recommendation: assessment.recommendation.as_str().to_string(),
            content_type: content_type.clone(),
            detection_types: detection_types.clone(),
        })?;

        debug!(
            "Checked {} bytes ({}): {} detections, risk={:.3}, {}",
            req.content.len(),
            content_type,
            detections.len(),
            assessment.risk_score,
            assessment.recommendation.as_str()
        );
        self.events.publish(
            store,
            EventType::ContentChecked,
            json!({
                "tracking_id": tracking_id,
                "content_type": content_type,
                "risk_score": assessment.risk_score,
                "recommendation": assessment.recommendation,
                "detection_types": detection_types,
                "metadata": req.metadata,
            }),
        );

        Ok(CheckResponse {
            tracking_id,
            has_sensitive_data: assessment.has_sensitive_data,
            risk_score: assessment.risk_score,
            recommendation: assessment.recommendation,
            detections,
        })
    }

    /// Append reviewer feedback on a detection.
    pub fn feedback(
        &self,
        store: &RegistryStore,
        req: &FeedbackRequest,
    ) -> Result<FeedbackResponse> {
        require_non_empty("detection_id", &req.detection_id)?;
        let action = req.action.trim().to_lowercase();
        if !FEEDBACK_ACTIONS.contains(&action.as_str()) {
            return Err(Error::Validation(format!(
                "action must be one of {}",
                FEEDBACK_ACTIONS.join(", ")
            )));
        }

        let comments = req.comments.as_deref().filter(|c| !c.trim().is_empty());
        let tracking_id =
            store.record_feedback(&req.detection_id, &action, req.was_correct, comments)?;
        self.events.publish(
            store,
            EventType::FeedbackRecorded,
            json!({
                "tracking_id": tracking_id,
                "detection_id": req.detection_id,
                "action": action,
                "was_correct": req.was_correct,
            }),
        );

        Ok(FeedbackResponse {
            status: "success",
            tracking_id,
        })
    }

    pub fn stats(&self, store: &RegistryStore) -> Result<RegistryStats> {
        store.stats()
    }
}

/// Map a span over the stripped text back onto the caller's chars.
fn caller_span(span: Span, positions: &[usize]) -> Span {
    match (positions.get(span.start), span.end.checked_sub(1).and_then(|i| positions.get(i))) {
        (Some(&start), Some(&last)) => Span {
            start,
            end: last + 1,
        },
        _ => span,
    }
}

/// Stable id for a detection: same content, same finding, same id.
fn detection_id(content_digest: &[u8], d: &Detection) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_digest);
    hasher.update(d.kind.label().as_bytes());
    hasher.update(d.span.start.to_be_bytes());
    hasher.update(d.span.end.to_be_bytes());
    format!("det_{}", &hex::encode(hasher.finalize())[..16])
}
