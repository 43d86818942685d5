//! SQLite-backed recipient registry.
//!
//! One connection behind a mutex. Every write, including the insert-or-ignore
//! plus select pair in `register`, runs inside a single locked section, so
//! concurrent registrations of the same recipient id agree on one uuid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::schema::{ACTIVITY_SCHEMA_SQL, REGISTRY_SCHEMA_SQL};
use crate::types::*;
use whisperprint_core::{require_non_empty, Error, Result};

/// Durable registry of recipients, fingerprint records and activity.
pub struct RegistryStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl RegistryStore {
    /// Open or create the registry database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(e.to_string()))?;
        }

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
        };

        let stats = store.stats()?;
        info!(
            "RegistryStore initialized: {} recipients, {} fingerprints, path={}",
            stats.total_recipients,
            stats.fingerprinted_documents,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}", REGISTRY_SCHEMA_SQL, ACTIVITY_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Recipients
    // ---------------------------------------------------------------

    /// Return the uuid for `recipient_id`, creating the recipient on first use.
    ///
    /// Fails with `Error::Revoked` if the recipient exists but was revoked.
    pub fn register(&self, recipient_id: &str) -> Result<String> {
        require_non_empty("recipient_id", recipient_id)?;

        let conn = self.conn.lock();
        let candidate = Uuid::new_v4().to_string();
        let inserted = conn
            .prepare_cached(
                "INSERT OR IGNORE INTO recipients (uuid, recipient_id, registered_at) VALUES (?1, ?2, ?3)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .execute(params![candidate, recipient_id, now_millis()])
            .map_err(|e| Error::Database(e.to_string()))?;

        let (uuid, revoked_at): (String, Option<i64>) = conn
            .prepare_cached("SELECT uuid, revoked_at FROM recipients WHERE recipient_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![recipient_id], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| Error::Database(e.to_string()))?;

        if revoked_at.is_some() {
            return Err(Error::Revoked(recipient_id.to_string()));
        }
        if inserted > 0 {
            info!("Registered recipient {} as {}", recipient_id, uuid);
        }
        Ok(uuid)
    }

    /// Map a uuid back to its active recipient id. `None` for unknown or revoked.
    pub fn resolve(&self, uuid: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let recipient_id = conn
            .prepare_cached(
                "SELECT recipient_id FROM recipients WHERE uuid = ?1 AND revoked_at IS NULL",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![uuid], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(recipient_id)
    }

    /// Look up a recipient (active or revoked) by its human-facing id.
    pub fn get_recipient(&self, recipient_id: &str) -> Result<Option<Recipient>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM recipients WHERE recipient_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![recipient_id], Self::row_to_recipient)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    pub fn get_recipient_by_uuid(&self, uuid: &str) -> Result<Option<Recipient>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM recipients WHERE uuid = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![uuid], Self::row_to_recipient)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// Paginated recipient listing, oldest registration first.
    pub fn list_recipients(&self, limit: usize, offset: usize) -> Result<Vec<Recipient>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM recipients ORDER BY registered_at ASC, recipient_id ASC LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], Self::row_to_recipient)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Number of recipients, revoked ones included, as `list_recipients` pages them.
    pub fn count_recipients(&self) -> Result<i64> {
        let conn = self.conn.lock();
        count(&conn, "SELECT COUNT(*) FROM recipients")
    }

    /// Change the human-facing id of a recipient. The uuid is unchanged.
    pub fn rename_recipient(&self, uuid: &str, new_recipient_id: &str) -> Result<Recipient> {
        require_non_empty("recipient_id", new_recipient_id)?;

        let conn = self.conn.lock();
        let current = conn
            .prepare_cached("SELECT * FROM recipients WHERE uuid = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![uuid], Self::row_to_recipient)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?
            .ok_or_else(|| Error::NotFound(format!("recipient {}", uuid)))?;

        if current.is_revoked() {
            return Err(Error::Revoked(current.recipient_id));
        }
        if current.recipient_id == new_recipient_id {
            return Ok(current);
        }

        let taken: Option<String> = conn
            .prepare_cached("SELECT uuid FROM recipients WHERE recipient_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![new_recipient_id], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        if taken.is_some() {
            return Err(Error::Conflict(format!(
                "recipient id {} is already in use",
                new_recipient_id
            )));
        }

        conn.execute(
            "UPDATE recipients SET recipient_id = ?2 WHERE uuid = ?1",
            params![uuid, new_recipient_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        info!(
            "Renamed recipient {} -> {} ({})",
            current.recipient_id, new_recipient_id, uuid
        );
        Ok(Recipient {
            recipient_id: new_recipient_id.to_string(),
            ..current
        })
    }

    /// Revoke a recipient. Returns false if it was already revoked.
    pub fn revoke_recipient(&self, uuid: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM recipients WHERE uuid = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![uuid], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        if exists.is_none() {
            return Err(Error::NotFound(format!("recipient {}", uuid)));
        }

        let count = conn
            .execute(
                "UPDATE recipients SET revoked_at = ?2 WHERE uuid = ?1 AND revoked_at IS NULL",
                params![uuid, now_millis()],
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        if count > 0 {
            info!("Revoked recipient {}", uuid);
        }
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Fingerprint records
    // ---------------------------------------------------------------

    /// Append a fingerprint record. Always allocates a fresh tracking id.
    pub fn record_fingerprint(
        &self,
        recipient_uuid: &str,
        record: NewFingerprint,
    ) -> Result<String> {
        let tracking_id = Uuid::new_v4().to_string();
        let meta_json = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO fingerprints (tracking_id, recipient_uuid, content_digest, visible_length, metadata_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            tracking_id,
            recipient_uuid,
            record.content_digest,
            record.visible_length,
            meta_json,
            now_millis()
        ])
        .map_err(|e| Error::Database(e.to_string()))?;

        debug!("Recorded fingerprint {} for {}", tracking_id, recipient_uuid);
        Ok(tracking_id)
    }

    pub fn get_fingerprint(&self, tracking_id: &str) -> Result<Option<FingerprintRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .prepare_cached("SELECT * FROM fingerprints WHERE tracking_id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![tracking_id], Self::row_to_fingerprint)
            .optional()
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(row)
    }

    /// All fingerprint records issued to a recipient, oldest first.
    pub fn fingerprints_for(&self, recipient_uuid: &str) -> Result<Vec<FingerprintRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM fingerprints WHERE recipient_uuid = ?1 ORDER BY created_at ASC, rowid ASC",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![recipient_uuid], Self::row_to_fingerprint)
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Activity
    // ---------------------------------------------------------------

    pub fn record_check(&self, check: &NewCheck) -> Result<()> {
        let detection_count: u32 = check.detection_types.values().sum();
        let types_json = serde_json::to_string(&check.detection_types)?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO checks (tracking_id, risk_score, recommendation, detection_count, content_type, detection_types_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![
            check.tracking_id,
            check.risk_score,
            check.recommendation,
            detection_count,
            check.content_type,
            types_json,
            now_millis()
        ])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Log an identification attempt. `recipient_uuid` is `None` for no match.
    pub fn record_identification(
        &self,
        recipient_uuid: Option<&str>,
        confidence: f64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO identifications (recipient_uuid, confidence, created_at) VALUES (?1, ?2, ?3)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![recipient_uuid, confidence, now_millis()])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Append a feedback entry and return its tracking id.
    pub fn record_feedback(
        &self,
        detection_id: &str,
        action: &str,
        was_correct: bool,
        comments: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO feedback (id, detection_id, action, was_correct, comments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![id, detection_id, action, was_correct, comments, now_millis()])
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    pub fn feedback_entries(&self, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM feedback ORDER BY created_at DESC, rowid DESC LIMIT ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(FeedbackRecord {
                    id: row.get("id")?,
                    detection_id: row.get("detection_id")?,
                    action: row.get("action")?,
                    was_correct: row.get("was_correct")?,
                    comments: row.get("comments")?,
                    created_at: from_millis(row.get("created_at")?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub fn append_audit_event(
        &self,
        event_type: &str,
        event_data: &serde_json::Value,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let data_json = serde_json::to_string(event_data)?;
        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO audit_log (event_type, event_data, timestamp) VALUES (?1, ?2, ?3)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![event_type, data_json, timestamp.timestamp_millis()])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    /// Most recent audit events first, optionally filtered by type.
    pub fn audit_events(&self, limit: usize, event_type: Option<&str>) -> Result<Vec<AuditEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT id, event_type, event_data, timestamp FROM audit_log
                 WHERE (?2 IS NULL OR event_type = ?2)
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64, event_type], |row| {
                let raw: String = row.get(2)?;
                Ok(AuditEvent {
                    id: row.get(0)?,
                    event_type: row.get(1)?,
                    event_data: serde_json::from_str(&raw).unwrap_or(serde_json::Value::Null),
                    timestamp: from_millis(row.get(3)?),
                })
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Statistics
    // ---------------------------------------------------------------

    pub fn stats(&self) -> Result<RegistryStats> {
        let conn = self.conn.lock();
        Ok(RegistryStats {
            fingerprinted_documents: count(&conn, "SELECT COUNT(*) FROM fingerprints")?,
            total_recipients: count(
                &conn,
                "SELECT COUNT(*) FROM recipients WHERE revoked_at IS NULL",
            )?,
            content_checks: count(&conn, "SELECT COUNT(*) FROM checks")?,
            identified_leaks: count(
                &conn,
                "SELECT COUNT(*) FROM identifications WHERE recipient_uuid IS NOT NULL",
            )?,
            feedback_count: count(&conn, "SELECT COUNT(*) FROM feedback")?,
        })
    }

    /// Aggregates over the last `days` days (totals are all-time).
    pub fn analytics(&self, days: u32) -> Result<Analytics> {
        let since = now_millis() - i64::from(days) * 86_400_000;
        let conn = self.conn.lock();

        let total_documents = count(&conn, "SELECT COUNT(*) FROM fingerprints")?;
        let total_recipients = count(
            &conn,
            "SELECT COUNT(*) FROM recipients WHERE revoked_at IS NULL",
        )?;

        let documents_by_day = {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT date(created_at / 1000, 'unixepoch') AS day, COUNT(*) FROM fingerprints
                     WHERE created_at >= ?1 GROUP BY day ORDER BY day ASC",
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            let rows = stmt
                .query_map(params![since], |row| {
                    Ok(DayCount {
                        date: row.get(0)?,
                        count: row.get(1)?,
                    })
                })
                .map_err(|e| Error::Database(e.to_string()))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Database(e.to_string()))?
        };

        let mut detections_by_type: BTreeMap<String, i64> = BTreeMap::new();
        let mut risk_score_distribution: BTreeMap<String, i64> =
            ["0-25%", "25-50%", "50-75%", "75-100%"]
                .iter()
                .map(|b| (b.to_string(), 0))
                .collect();

        let mut stmt = conn
            .prepare_cached(
                "SELECT risk_score, detection_types_json FROM checks WHERE created_at >= ?1",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        for row in rows {
            let (score, types_json) = row.map_err(|e| Error::Database(e.to_string()))?;
            *risk_score_distribution
                .entry(risk_bucket(score).to_string())
                .or_insert(0) += 1;
            let types: BTreeMap<String, i64> =
                serde_json::from_str(&types_json).unwrap_or_default();
            for (kind, n) in types {
                *detections_by_type.entry(kind).or_insert(0) += n;
            }
        }

        Ok(Analytics {
            total_documents,
            total_recipients,
            documents_by_day,
            detections_by_type,
            risk_score_distribution,
        })
    }

    /// Run SQLite's integrity check plus referential checks on fingerprints.
    pub fn integrity_check(&self) -> Result<IntegrityReport> {
        let conn = self.conn.lock();
        let sqlite: String = conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))?;
        let orphan_fingerprints = count(
            &conn,
            "SELECT COUNT(*) FROM fingerprints f
             LEFT JOIN recipients r ON r.uuid = f.recipient_uuid
             WHERE r.uuid IS NULL",
        )?;

        Ok(IntegrityReport {
            ok: sqlite == "ok" && orphan_fingerprints == 0,
            sqlite,
            recipients: count(&conn, "SELECT COUNT(*) FROM recipients")?,
            revoked_recipients: count(
                &conn,
                "SELECT COUNT(*) FROM recipients WHERE revoked_at IS NOT NULL",
            )?,
            fingerprints: count(&conn, "SELECT COUNT(*) FROM fingerprints")?,
            orphan_fingerprints,
            audit_events: count(&conn, "SELECT COUNT(*) FROM audit_log")?,
        })
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_recipient(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipient> {
        let meta: Option<String> = row.get("metadata_json")?;
        Ok(Recipient {
            recipient_id: row.get("recipient_id")?,
            uuid: row.get("uuid")?,
            registered_at: from_millis(row.get("registered_at")?),
            revoked_at: row.get::<_, Option<i64>>("revoked_at")?.map(from_millis),
            metadata: meta.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    fn row_to_fingerprint(row: &rusqlite::Row<'_>) -> rusqlite::Result<FingerprintRecord> {
        let meta: Option<String> = row.get("metadata_json")?;
        Ok(FingerprintRecord {
            tracking_id: row.get("tracking_id")?,
            recipient_uuid: row.get("recipient_uuid")?,
            content_digest: row.get("content_digest")?,
            visible_length: row.get("visible_length")?,
            metadata: meta.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: from_millis(row.get("created_at")?),
        })
    }
}

fn count(conn: &Connection, sql: &str) -> Result<i64> {
    conn.query_row(sql, [], |row| row.get(0))
        .map_err(|e| Error::Database(e.to_string()))
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> (RegistryStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RegistryStore::open(dir.path().join("whisperprint.db")).unwrap();
        (store, dir)
    }

    fn fingerprint(store: &RegistryStore, uuid: &str, visible_length: u32) -> String {
        store
            .record_fingerprint(
                uuid,
                NewFingerprint {
                    content_digest: "ab".repeat(32),
                    visible_length,
                    metadata: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn test_register_is_idempotent() {
        let (store, _dir) = test_store();
        let first = store.register("alice@example.com").unwrap();
        let second = store.register("alice@example.com").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.resolve(&first).unwrap().as_deref(), Some("alice@example.com"));
        assert_eq!(store.stats().unwrap().total_recipients, 1);
    }

    #[test]
    fn test_register_rejects_empty_id() {
        let (store, _dir) = test_store();
        assert!(matches!(store.register("  "), Err(Error::Validation(_))));
    }

    #[test]
    fn test_concurrent_register_agrees_on_uuid() {
        let (store, _dir) = test_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.register("bob@example.com").unwrap())
            })
            .collect();
        let uuids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(uuids.iter().all(|u| u == &uuids[0]));
        assert_eq!(store.list_recipients(10, 0).unwrap().len(), 1);
    }

    #[test]
    fn test_resolve_unknown_is_none() {
        let (store, _dir) = test_store();
        assert_eq!(store.resolve("00000000-0000-0000-0000-000000000000").unwrap(), None);
    }

    #[test]
    fn test_revoke_hides_recipient() {
        let (store, _dir) = test_store();
        let uuid = store.register("carol").unwrap();
        assert!(store.revoke_recipient(&uuid).unwrap());
        assert!(!store.revoke_recipient(&uuid).unwrap());
        assert_eq!(store.resolve(&uuid).unwrap(), None);
        assert!(matches!(store.register("carol"), Err(Error::Revoked(_))));
        assert!(store.get_recipient("carol").unwrap().unwrap().is_revoked());
        assert_eq!(store.count_recipients().unwrap(), 1);
        assert_eq!(store.list_recipients(10, 0).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap().total_recipients, 0);
        assert!(matches!(
            store.revoke_recipient("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_keeps_uuid() {
        let (store, _dir) = test_store();
        let uuid = store.register("dave").unwrap();
        store.register("erin").unwrap();

        let renamed = store.rename_recipient(&uuid, "dave@corp.example").unwrap();
        assert_eq!(renamed.uuid, uuid);
        assert_eq!(store.resolve(&uuid).unwrap().as_deref(), Some("dave@corp.example"));
        assert!(store.get_recipient("dave").unwrap().is_none());

        assert!(matches!(
            store.rename_recipient(&uuid, "erin"),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_fingerprint_records() {
        let (store, _dir) = test_store();
        let uuid = store.register("frank").unwrap();
        let a = fingerprint(&store, &uuid, 120);
        let b = fingerprint(&store, &uuid, 120);
        assert_ne!(a, b);

        let records = store.fingerprints_for(&uuid).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tracking_id, a);
        assert_eq!(store.get_fingerprint(&b).unwrap().unwrap().visible_length, 120);
        assert_eq!(store.stats().unwrap().fingerprinted_documents, 2);
    }

    #[test]
    fn test_activity_counters() {
        let (store, _dir) = test_store();
        let uuid = store.register("grace").unwrap();
        store.record_identification(Some(&uuid), 1.0).unwrap();
        store.record_identification(None, 0.0).unwrap();
        store
            .record_feedback("det-1", "redact", true, Some("looks right"))
            .unwrap();

        let mut types = BTreeMap::new();
        types.insert("SSN".to_string(), 1);
        store
            .record_check(&NewCheck {
                tracking_id: "check-1".into(),
                risk_score: 0.9,
                recommendation: "block".into(),
                content_type: "text".into(),
                detection_types: types,
            })
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.identified_leaks, 1);
        assert_eq!(stats.feedback_count, 1);
        assert_eq!(stats.content_checks, 1);
        assert_eq!(store.feedback_entries(5).unwrap()[0].action, "redact");
    }

    #[test]
    fn test_analytics_buckets() {
        let (store, _dir) = test_store();
        let uuid = store.register("heidi").unwrap();
        fingerprint(&store, &uuid, 10);

        for (i, score) in [0.1, 0.6, 0.9].iter().enumerate() {
            let mut types = BTreeMap::new();
            types.insert("EMAIL".to_string(), 2);
            store
                .record_check(&NewCheck {
                    tracking_id: format!("c{}", i),
                    risk_score: *score,
                    recommendation: "review".into(),
                    content_type: "text".into(),
                    detection_types: types,
                })
                .unwrap();
        }

        let analytics = store.analytics(7).unwrap();
        assert_eq!(analytics.total_documents, 1);
        assert_eq!(analytics.documents_by_day.len(), 1);
        assert_eq!(analytics.detections_by_type["EMAIL"], 6);
        assert_eq!(analytics.risk_score_distribution["0-25%"], 1);
        assert_eq!(analytics.risk_score_distribution["25-50%"], 0);
        assert_eq!(analytics.risk_score_distribution["75-100%"], 1);
    }

    #[test]
    fn test_audit_log_filter() {
        let (store, _dir) = test_store();
        let now = Utc::now();
        store
            .append_audit_event("content_checked", &serde_json::json!({"n": 1}), now)
            .unwrap();
        store
            .append_audit_event("document_fingerprinted", &serde_json::json!({"n": 2}), now)
            .unwrap();

        let all = store.audit_events(10, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].event_type, "document_fingerprinted");

        let checks = store.audit_events(10, Some("content_checked")).unwrap();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].event_data["n"], 1);
    }

    #[test]
    fn test_integrity_check_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("whisperprint.db");
        let uuid = {
            let store = RegistryStore::open(&path).unwrap();
            store.register("ivan").unwrap()
        };

        let store = RegistryStore::open(&path).unwrap();
        assert_eq!(store.register("ivan").unwrap(), uuid);
        let report = store.integrity_check().unwrap();
        assert!(report.ok);
        assert_eq!(report.recipients, 1);
        assert_eq!(report.orphan_fingerprints, 0);
    }
}
