//! End-to-end runtime scenarios over an on-disk registry.

use whisperprint_core::{CodecSettings, DataPaths, WhisperPrintConfig};
use whisperprint_guardian::{DetectionType, Recommendation};
use whisperprint_runtime::*;
use whisperprint_store::RegistryStore;

const MEMO: &str = "Quarterly revenue grew eleven percent on stronger subscription renewals. \
The board asked finance to hold the new pricing until the partner review is complete. \
Hiring stays frozen for the platform group through the end of the year, and the \
Lisbon office move is postponed to the spring.";

fn setup() -> (Orchestrator, RegistryStore, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let data_paths = DataPaths::new(dir.path()).unwrap();
    let store = RegistryStore::open(&data_paths.registry_db).unwrap();
    let config = WhisperPrintConfig {
        port: 0,
        data_paths,
        codec: CodecSettings::default(),
        match_threshold: 0.5,
    };
    (Orchestrator::new(&config), store, dir)
}

fn fingerprint(orch: &Orchestrator, store: &RegistryStore, recipient: &str) -> FingerprintResponse {
    orch.fingerprint(
        store,
        &FingerprintRequest {
            text: MEMO.into(),
            recipient_id: recipient.into(),
            metadata: None,
        },
    )
    .unwrap()
}

#[test]
fn fingerprint_then_identify_full_text() {
    let (orch, store, _dir) = setup();
    let fp = fingerprint(&orch, &store, "alice@example.com");

    let found = orch
        .identify(&store, &IdentifyRequest { leaked_text: fp.fingerprinted_text })
        .unwrap();
    assert_eq!(found.recipient_id.as_deref(), Some("alice@example.com"));
    assert!(found.confidence >= 0.95, "confidence {}", found.confidence);

    let meta = found.metadata.unwrap();
    assert_eq!(meta.recipient_uuid, fp.recipient_uuid);
    assert_eq!(meta.candidate_tracking_ids, vec![fp.tracking_id]);
    assert_eq!(store.stats().unwrap().identified_leaks, 1);
}

#[test]
fn short_report_identifies_recipient() {
    let (orch, store, _dir) = setup();
    let fp = orch
        .fingerprint(
            &store,
            &FingerprintRequest {
                text: "Report body".into(),
                recipient_id: "alice@example.com".into(),
                metadata: None,
            },
        )
        .unwrap();

    let found = orch
        .identify(&store, &IdentifyRequest { leaked_text: fp.fingerprinted_text })
        .unwrap();
    assert_eq!(found.recipient_id.as_deref(), Some("alice@example.com"));
    assert!(found.confidence >= 0.95);
}

#[test]
fn leak_pasted_into_an_email_identifies_recipient() {
    let (orch, store, _dir) = setup();
    let fp = fingerprint(&orch, &store, "frank@example.com");
    let leaked = format!(
        "From: someone@elsewhere.example\nSubject: look what turned up\n\n\
         Found this on a forum thread this morning, no idea who posted it.\n\n{}\n\n\
         Can we talk about it on Monday? There is a lot more context to go through \
         and I would rather not put it all in writing.",
        fp.fingerprinted_text
    );

    let found = orch
        .identify(&store, &IdentifyRequest { leaked_text: leaked })
        .unwrap();
    assert_eq!(found.recipient_id.as_deref(), Some("frank@example.com"));
    assert!(found.confidence >= 0.95, "confidence {}", found.confidence);
}

#[test]
fn leaked_second_half_identifies_recipient() {
    let (orch, store, _dir) = setup();
    fingerprint(&orch, &store, "alice@example.com");
    let bob = fingerprint(&orch, &store, "bob@example.com");

    let chars: Vec<char> = bob.fingerprinted_text.chars().collect();
    let half: String = chars[chars.len() / 2..].iter().collect();
    let found = orch
        .identify(&store, &IdentifyRequest { leaked_text: half })
        .unwrap();
    assert_eq!(found.recipient_id.as_deref(), Some("bob@example.com"));
    assert!(found.confidence >= 0.6);
}

#[test]
fn same_recipient_keeps_uuid_across_documents() {
    let (orch, store, _dir) = setup();
    let first = fingerprint(&orch, &store, "carol");
    let second = fingerprint(&orch, &store, "carol");
    assert_eq!(first.recipient_uuid, second.recipient_uuid);
    assert_ne!(first.tracking_id, second.tracking_id);

    let stats = orch.stats(&store).unwrap();
    assert_eq!(stats.total_recipients, 1);
    assert_eq!(stats.fingerprinted_documents, 2);
}

#[test]
fn ssn_check_recommends_review_or_block() {
    let (orch, store, _dir) = setup();
    let result = orch.check(&store, &CheckRequest::text("SSN: 123-45-6789")).unwrap();

    assert!(result.has_sensitive_data);
    assert_eq!(result.detections.len(), 1);
    let ssn = &result.detections[0];
    assert_eq!(ssn.kind, DetectionType::Ssn);
    assert!(ssn.confidence >= 0.7);
    assert_eq!(ssn.masked_value, "***-**-*789");
    assert!(result.risk_score > 0.5);
    assert!(matches!(
        result.recommendation,
        Recommendation::Review | Recommendation::Block
    ));
}

#[test]
fn plain_text_is_not_identified() {
    let (orch, store, _dir) = setup();
    fingerprint(&orch, &store, "alice@example.com");

    let found = orch
        .identify(
            &store,
            &IdentifyRequest {
                leaked_text: "plain unwatermarked text".into(),
            },
        )
        .unwrap();
    assert!(found.recipient_id.is_none());
    assert!(found.metadata.is_none());
    assert!(found.confidence < 0.5);
    assert_eq!(store.stats().unwrap().identified_leaks, 0);
}

#[test]
fn revoked_recipient_is_not_identified() {
    let (orch, store, _dir) = setup();
    let fp = fingerprint(&orch, &store, "dave");
    store.revoke_recipient(&fp.recipient_uuid).unwrap();

    let found = orch
        .identify(&store, &IdentifyRequest { leaked_text: fp.fingerprinted_text })
        .unwrap();
    assert!(found.recipient_id.is_none());
}

#[test]
fn check_is_deterministic() {
    let (orch, store, _dir) = setup();
    let content = "Contact jane.doe@corp.example or 415-555-0132. Card 4111 1111 1111 1111. \
                   The patient diagnosis is attached.";
    let a = orch.check(&store, &CheckRequest::text(content)).unwrap();
    let b = orch.check(&store, &CheckRequest::text(content)).unwrap();

    assert_ne!(a.tracking_id, b.tracking_id);
    assert_eq!(a.risk_score, b.risk_score);
    assert_eq!(a.recommendation, b.recommendation);
    assert_eq!(a.detections, b.detections);
    assert!(a.detections.iter().any(|d| d.kind == DetectionType::CreditCard));
    assert_eq!(orch.stats(&store).unwrap().content_checks, 2);
}

#[test]
fn feedback_references_a_detection() {
    let (orch, store, _dir) = setup();
    let result = orch.check(&store, &CheckRequest::text("SSN: 123-45-6789")).unwrap();
    let detection_id = result.detections[0].id.clone();

    orch.feedback(
        &store,
        &FeedbackRequest {
            detection_id: detection_id.clone(),
            action: "block".into(),
            was_correct: true,
            comments: None,
        },
    )
    .unwrap();
    assert_eq!(store.feedback_entries(10).unwrap()[0].detection_id, detection_id);
}

#[test]
fn check_never_returns_raw_values() {
    let (orch, store, _dir) = setup();
    let content = "card 4111 1111 1111 1111, mail jane.doe@corp.example";
    let result = orch.check(&store, &CheckRequest::text(content)).unwrap();
    for d in &result.detections {
        let raw: String = content.chars().skip(d.span.start).take(d.span.len()).collect();
        assert_ne!(d.masked_value, raw);
    }
}
