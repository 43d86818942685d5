//! Identification matcher: turns a decoded watermark into a recipient.

use tracing::debug;
use whisperprint_codec::Decoded;
use whisperprint_core::Result;
use whisperprint_store::RegistryStore;

use crate::types::{IdentifyResponse, MatchMetadata};

/// Maps decode results to recipients. A match needs a decoded uuid, decode
/// confidence of at least `threshold`, and an active registry entry.
#[derive(Debug, Clone, Copy)]
pub struct Matcher {
    threshold: f64,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        let threshold = if threshold.is_finite() {
            threshold.clamp(0.0, 1.0)
        } else {
            whisperprint_core::config::DEFAULT_MATCH_THRESHOLD
        };
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Resolve `decoded` against the registry.
    ///
    /// Unknown or revoked uuids give a no-match result carrying the decode
    /// confidence; only storage faults are errors.
    pub fn resolve(&self, store: &RegistryStore, decoded: &Decoded) -> Result<IdentifyResponse> {
        let uuid = match decoded.bits {
            Some(uuid) if decoded.confidence >= self.threshold => uuid.to_string(),
            _ => {
                debug!(
                    "No match: bits={:?}, confidence={:.3}, threshold={}",
                    decoded.bits, decoded.confidence, self.threshold
                );
                return Ok(IdentifyResponse::no_match(decoded.confidence));
            }
        };

        let recipient = match store.get_recipient_by_uuid(&uuid)? {
            Some(r) if !r.is_revoked() => r,
            _ => {
                debug!("Decoded uuid {} is not an active recipient", uuid);
                return Ok(IdentifyResponse::no_match(decoded.confidence));
            }
        };

        let fingerprints = store.fingerprints_for(&uuid)?;
        let candidate_tracking_ids = match decoded.source_visible_len {
            Some(len) => fingerprints
                .iter()
                .filter(|f| f.visible_length == len)
                .map(|f| f.tracking_id.clone())
                .collect(),
            None => Vec::new(),
        };

        Ok(IdentifyResponse {
            recipient_id: Some(recipient.recipient_id),
            confidence: decoded.confidence,
            metadata: Some(MatchMetadata {
                recipient_uuid: uuid,
                registered_at: recipient.registered_at,
                fingerprint_count: fingerprints.len(),
                candidate_tracking_ids,
                copies_recovered: decoded.copies_recovered,
                copies_expected: decoded.copies_expected,
            }),
        })
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(whisperprint_core::config::DEFAULT_MATCH_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use whisperprint_store::NewFingerprint;

    fn test_store() -> (RegistryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    fn decoded(bits: Option<Uuid>, confidence: f64, source_visible_len: Option<u32>) -> Decoded {
        Decoded {
            bits,
            confidence,
            copies_recovered: 3,
            copies_expected: 3.0,
            source_visible_len,
        }
    }

    #[test]
    fn test_match_with_candidates() {
        let (store, _dir) = test_store();
        let uuid = store.register("alice@example.com").unwrap();
        let long = store
            .record_fingerprint(
                &uuid,
                NewFingerprint {
                    content_digest: "a".into(),
                    visible_length: 120,
                    metadata: None,
                },
            )
            .unwrap();
        store
            .record_fingerprint(
                &uuid,
                NewFingerprint {
                    content_digest: "b".into(),
                    visible_length: 80,
                    metadata: None,
                },
            )
            .unwrap();

        let bits = Uuid::parse_str(&uuid).unwrap();
        let result = Matcher::default()
            .resolve(&store, &decoded(Some(bits), 1.0, Some(120)))
            .unwrap();
        assert_eq!(result.recipient_id.as_deref(), Some("alice@example.com"));
        let meta = result.metadata.unwrap();
        assert_eq!(meta.fingerprint_count, 2);
        assert_eq!(meta.candidate_tracking_ids, vec![long]);
    }

    #[test]
    fn test_below_threshold_is_no_match() {
        let (store, _dir) = test_store();
        let uuid = store.register("bob").unwrap();
        let bits = Uuid::parse_str(&uuid).unwrap();
        let result = Matcher::new(0.5)
            .resolve(&store, &decoded(Some(bits), 0.4, Some(10)))
            .unwrap();
        assert_eq!(result, IdentifyResponse::no_match(0.4));
    }

    #[test]
    fn test_unknown_and_revoked_are_no_match() {
        let (store, _dir) = test_store();
        let unknown = Matcher::default()
            .resolve(&store, &decoded(Some(Uuid::new_v4()), 1.0, None))
            .unwrap();
        assert!(unknown.recipient_id.is_none());
        assert_eq!(unknown.confidence, 1.0);

        let uuid = store.register("carol").unwrap();
        store.revoke_recipient(&uuid).unwrap();
        let bits = Uuid::parse_str(&uuid).unwrap();
        let revoked = Matcher::default()
            .resolve(&store, &decoded(Some(bits), 1.0, None))
            .unwrap();
        assert!(revoked.recipient_id.is_none());
    }

    #[test]
    fn test_non_finite_threshold_falls_back() {
        assert_eq!(Matcher::new(f64::NAN).threshold(), 0.5);
        assert_eq!(Matcher::new(3.0).threshold(), 1.0);
    }
}
