//! Database schema SQL.

/// Registry tables: recipients and the fingerprint records issued to them.
pub const REGISTRY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS recipients (
    uuid TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL UNIQUE,
    registered_at INTEGER NOT NULL,
    revoked_at INTEGER,
    metadata_json TEXT
);

CREATE TABLE IF NOT EXISTS fingerprints (
    tracking_id TEXT PRIMARY KEY,
    recipient_uuid TEXT NOT NULL REFERENCES recipients(uuid),
    content_digest TEXT NOT NULL,
    visible_length INTEGER NOT NULL,
    metadata_json TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_fingerprints_recipient ON fingerprints(recipient_uuid);
CREATE INDEX IF NOT EXISTS idx_fingerprints_created ON fingerprints(created_at);
"#;

/// Activity tables: content checks, identifications, feedback, audit log.
///
/// Checks store per-type detection counts only, never the scanned content.
pub const ACTIVITY_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS checks (
    tracking_id TEXT PRIMARY KEY,
    risk_score REAL NOT NULL,
    recommendation TEXT NOT NULL,
    detection_count INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    detection_types_json TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_checks_created ON checks(created_at);

CREATE TABLE IF NOT EXISTS identifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_uuid TEXT,
    confidence REAL NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS feedback (
    id TEXT PRIMARY KEY,
    detection_id TEXT NOT NULL,
    action TEXT NOT NULL,
    was_correct INTEGER NOT NULL,
    comments TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS audit_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_type TEXT NOT NULL,
    event_data TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_log_type ON audit_log(event_type);
"#;
