//! Registry validation: the `validate` subcommand.
//!
//! Checks that a data directory holds a usable WhisperPrint registry:
//! - every table and column the server reads is present
//! - SQLite's own integrity check passes
//! - no fingerprint record points at a missing recipient
//! - `risk-config.json`, when present, parses

use std::path::Path;

use rusqlite::Connection;
use tracing::{error, info};
use whisperprint_guardian::RiskConfig;
use whisperprint_store::RegistryStore;

const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    ("recipients", &["uuid", "recipient_id", "registered_at", "revoked_at", "metadata_json"]),
    (
        "fingerprints",
        &["tracking_id", "recipient_uuid", "content_digest", "visible_length", "created_at"],
    ),
    ("checks", &["tracking_id", "risk_score", "recommendation", "detection_types_json"]),
    ("identifications", &["recipient_uuid", "confidence", "created_at"]),
    ("feedback", &["id", "detection_id", "action", "was_correct"]),
    ("audit_log", &["id", "event_type", "event_data", "timestamp"]),
];

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub db_valid: bool,
    pub recipients: i64,
    pub revoked_recipients: i64,
    pub fingerprints: i64,
    pub audit_events: i64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.db_valid && self.errors.is_empty()
    }
}

/// Validate the registry under `data_dir`. Never creates or modifies it
/// when the schema is incomplete.
pub fn validate(data_dir: &Path) -> ValidationReport {
    let mut report = ValidationReport::default();

    let db_path = data_dir.join("whisperprint.db");
    if !db_path.exists() {
        report
            .errors
            .push(format!("Registry not found: {}", db_path.display()));
        return report;
    }

    {
        let conn = match Connection::open_with_flags(
            &db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        ) {
            Ok(c) => c,
            Err(e) => {
                report.errors.push(format!("Failed to open registry: {}", e));
                return report;
            }
        };

        for (table, columns) in REQUIRED_COLUMNS {
            match table_exists(&conn, table) {
                Ok(true) => {
                    let present = column_names(&conn, table);
                    for col in columns.iter() {
                        if !present.iter().any(|p| p == col) {
                            report
                                .errors
                                .push(format!("{} table missing column: {}", table, col));
                        }
                    }
                }
                Ok(false) => report.errors.push(format!("Missing required table: {}", table)),
                Err(e) => report
                    .errors
                    .push(format!("Error checking table {}: {}", table, e)),
            }
        }
    }

    if !report.errors.is_empty() {
        error!("Registry schema check failed with {} errors", report.errors.len());
        return report;
    }

    let integrity = match RegistryStore::open(&db_path).and_then(|s| s.integrity_check()) {
        Ok(r) => r,
        Err(e) => {
            report.errors.push(format!("Integrity check failed: {}", e));
            return report;
        }
    };
    if integrity.sqlite != "ok" {
        report
            .errors
            .push(format!("SQLite integrity check: {}", integrity.sqlite));
    }
    if integrity.orphan_fingerprints > 0 {
        report.errors.push(format!(
            "{} fingerprint records reference missing recipients",
            integrity.orphan_fingerprints
        ));
    }
    report.recipients = integrity.recipients;
    report.revoked_recipients = integrity.revoked_recipients;
    report.fingerprints = integrity.fingerprints;
    report.audit_events = integrity.audit_events;
    report.db_valid = integrity.ok;

    let risk_config = data_dir.join("risk-config.json");
    if let Ok(raw) = std::fs::read_to_string(&risk_config) {
        if let Err(e) = serde_json::from_str::<RiskConfig>(&raw) {
            report.warnings.push(format!(
                "{} is invalid and will be ignored: {}",
                risk_config.display(),
                e
            ));
        }
    }

    info!(
        "Validated registry: {} recipients, {} fingerprints",
        report.recipients, report.fingerprints
    );
    report
}

pub fn print_report(report: &ValidationReport) {
    println!("=== WhisperPrint Registry Report ===");
    println!();
    println!("Registry valid:     {}", if report.db_valid { "YES" } else { "NO" });
    println!("Recipients:         {}", report.recipients);
    println!("Revoked:            {}", report.revoked_recipients);
    println!("Fingerprints:       {}", report.fingerprints);
    println!("Audit events:       {}", report.audit_events);

    if !report.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for w in &report.warnings {
            println!("  - {}", w);
        }
    }

    if !report.errors.is_empty() {
        println!();
        println!("Errors:");
        for e in &report.errors {
            println!("  - {}", e);
        }
    }

    println!();
    if report.is_ok() {
        println!("Status: READY FOR USE");
    } else {
        println!("Status: VALIDATION FAILED");
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    // Table names come from REQUIRED_COLUMNS only.
    let query = format!("PRAGMA table_info({})", table);
    let mut names = Vec::new();
    if let Ok(mut stmt) = conn.prepare(&query) {
        if let Ok(rows) = stmt.query_map([], |row| row.get::<_, String>(1)) {
            names.extend(rows.filter_map(|r| r.ok()));
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_registry() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate(dir.path());
        assert!(!report.is_ok());
        assert!(report.errors[0].contains("Registry not found"));
    }

    #[test]
    fn test_valid_registry() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RegistryStore::open(dir.path().join("whisperprint.db")).unwrap();
            let uuid = store.register("alice@example.com").unwrap();
            store.register("bob@example.com").unwrap();
            store
                .record_fingerprint(&uuid, whisperprint_store::NewFingerprint::default())
                .unwrap();
        }

        let report = validate(dir.path());
        assert!(report.is_ok(), "{:?}", report.errors);
        assert_eq!(report.recipients, 2);
        assert_eq!(report.fingerprints, 1);
    }

    #[test]
    fn test_foreign_database_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let conn = Connection::open(dir.path().join("whisperprint.db")).unwrap();
        conn.execute_batch("CREATE TABLE recipients (uuid TEXT PRIMARY KEY);")
            .unwrap();
        drop(conn);

        let report = validate(dir.path());
        assert!(!report.is_ok());
        assert!(report
            .errors
            .iter()
            .any(|e| e == "recipients table missing column: recipient_id"));
        assert!(report
            .errors
            .iter()
            .any(|e| e == "Missing required table: audit_log"));
    }

    #[test]
    fn test_invalid_risk_config_warns() {
        let dir = tempfile::tempdir().unwrap();
        RegistryStore::open(dir.path().join("whisperprint.db")).unwrap();
        std::fs::write(dir.path().join("risk-config.json"), "{ nope").unwrap();

        let report = validate(dir.path());
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 1);
    }
}
