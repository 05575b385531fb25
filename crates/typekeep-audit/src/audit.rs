// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail — append-only SQLite log with one entry per edit invocation.
//
// Schema:
//   audit_log(
//     id             INTEGER PRIMARY KEY AUTOINCREMENT,
//     operation_id   TEXT    NOT NULL UNIQUE,  -- UUID v4
//     operation_kind TEXT    NOT NULL,         -- "edit-text" | "replay"
//     timestamp      TEXT    NOT NULL,         -- RFC 3339
//     status         TEXT    NOT NULL,         -- success | partial | failed | cancelled
//     input_id       TEXT    NOT NULL,         -- SHA-256 hex digest
//     output_id      TEXT,                     -- SHA-256 hex digest
//     entry          TEXT    NOT NULL          -- full AuditEntry as JSON
//   )
//
// BEFORE UPDATE and BEFORE DELETE triggers abort any attempt to change or
// remove a row, so the table can only grow.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};
use typekeep_core::error::{Result, TypekeepError};
use typekeep_core::types::{AuditEntry, OperationId};

// ---------------------------------------------------------------------------
// Local error helpers
// ---------------------------------------------------------------------------

/// Convert a `rusqlite::Error` into a `TypekeepError::Database`.
fn db_err(e: rusqlite::Error) -> TypekeepError {
    TypekeepError::Database(e.to_string())
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        operation_id   TEXT    NOT NULL UNIQUE,
        operation_kind TEXT    NOT NULL,
        timestamp      TEXT    NOT NULL,
        status         TEXT    NOT NULL,
        input_id       TEXT    NOT NULL,
        output_id      TEXT,
        entry          TEXT    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS audit_log_input ON audit_log (input_id);
    CREATE TRIGGER IF NOT EXISTS audit_log_no_update
        BEFORE UPDATE ON audit_log
        BEGIN SELECT RAISE(ABORT, 'audit log is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS audit_log_no_delete
        BEFORE DELETE ON audit_log
        BEGIN SELECT RAISE(ABORT, 'audit log is append-only'); END;
";

// ---------------------------------------------------------------------------
// Audit log
// ---------------------------------------------------------------------------

/// Append-only audit log backed by a SQLite database.
///
/// Each top-level edit (or replay) appends exactly one [`AuditEntry`]
/// covering every run it touched. Entries are stored whole, as JSON, next
/// to a few indexed columns used for lookups.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    ///
    /// The table and its triggers are created automatically if they do not
    /// already exist.  WAL mode is enabled for better concurrent-read
    /// performance.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL for concurrent readers.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    /// Append `entry` and return its row id.
    #[instrument(skip_all, fields(operation = %entry.operation_id, status = entry.status.as_str()))]
    pub fn append(&self, entry: &AuditEntry) -> Result<i64> {
        let json = serde_json::to_string(entry)?;
        self.conn
            .execute(
                "INSERT INTO audit_log
                    (operation_id, operation_kind, timestamp, status, input_id, output_id, entry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    entry.operation_id.to_string(),
                    entry.operation_kind.as_str(),
                    entry.timestamp.to_rfc3339(),
                    entry.status.as_str(),
                    entry.input_id,
                    entry.output_id,
                    json,
                ],
            )
            .map_err(db_err)?;

        let id = self.conn.last_insert_rowid();
        debug!(id, "audit entry appended");
        Ok(id)
    }

    /// The entry recorded for `operation_id`, if any.
    pub fn entry(&self, operation_id: &OperationId) -> Result<Option<AuditEntry>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT entry FROM audit_log WHERE operation_id = ?1",
                params![operation_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        json.map(|json| serde_json::from_str(&json).map_err(TypekeepError::from))
            .transpose()
    }

    /// Every entry whose input fingerprint is `input_id`, oldest first.
    pub fn entries_for_input(&self, input_id: &str) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT entry FROM audit_log WHERE input_id = ?1 ORDER BY id ASC",
            params![input_id],
        )
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.query(
            "SELECT entry FROM audit_log ORDER BY id DESC LIMIT ?1",
            params![limit],
        )
    }

    /// Return the total number of entries in the audit log.
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }

    /// Write every entry, oldest first, as one JSON object per line.
    /// Returns the number of entries written.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<usize> {
        let entries = self.query("SELECT entry FROM audit_log ORDER BY id ASC", [])?;
        let mut out = BufWriter::new(File::create(path)?);
        for entry in &entries {
            serde_json::to_writer(&mut out, entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        debug!(entries = entries.len(), "audit log exported");
        Ok(entries.len())
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params, |row| row.get::<_, String>(0))
            .map_err(db_err)?;

        let mut entries = Vec::new();
        for row in rows {
            let json = row.map_err(db_err)?;
            entries.push(serde_json::from_str(&json)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use typekeep_core::types::{EditRequest, OperationKind, OperationStatus};

    fn make_log() -> AuditLog {
        AuditLog::open_in_memory().expect("open in-memory audit log")
    }

    fn make_entry(input_id: &str, status: OperationStatus) -> AuditEntry {
        AuditEntry {
            operation_id: OperationId::new(),
            operation_kind: OperationKind::EditText,
            timestamp: Utc::now(),
            status,
            input_id: input_id.to_string(),
            output_id: Some(format!("{input_id}-out")),
            input_path: None,
            parameters: serde_json::to_value(EditRequest::replace_first("Old", "New")).unwrap(),
            outcomes: Vec::new(),
            backup_location: Some("/tmp/backup.pdf".into()),
            notes: vec!["note".into()],
            error: None,
        }
    }

    #[test]
    fn append_and_count() {
        let log = make_log();
        assert_eq!(log.count().unwrap(), 0);

        log.append(&make_entry("aaa", OperationStatus::Success)).unwrap();
        log.append(&make_entry("aaa", OperationStatus::Failed)).unwrap();

        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn entry_round_trips_by_operation_id() {
        let log = make_log();
        let entry = make_entry("abc", OperationStatus::Partial);
        log.append(&entry).unwrap();

        let stored = log.entry(&entry.operation_id).unwrap().unwrap();
        assert_eq!(stored.operation_id, entry.operation_id);
        assert_eq!(stored.status, OperationStatus::Partial);
        assert_eq!(stored.request().unwrap(), EditRequest::replace_first("Old", "New"));
        assert!(log.entry(&OperationId::new()).unwrap().is_none());
    }

    #[test]
    fn entries_for_input() {
        let log = make_log();
        log.append(&make_entry("aaa", OperationStatus::Success)).unwrap();
        log.append(&make_entry("bbb", OperationStatus::Success)).unwrap();
        log.append(&make_entry("aaa", OperationStatus::Failed)).unwrap();

        let entries = log.entries_for_input("aaa").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, OperationStatus::Success);
        assert_eq!(entries[1].status, OperationStatus::Failed);
    }

    #[test]
    fn recent_entries_ordering() {
        let log = make_log();
        let mut ids = Vec::new();
        for i in 0..5 {
            let entry = make_entry(&format!("hash_{i}"), OperationStatus::Success);
            ids.push(entry.operation_id);
            log.append(&entry).unwrap();
        }

        let recent = log.recent_entries(3).unwrap();
        assert_eq!(recent.len(), 3);
        // Newest first.
        assert_eq!(recent[0].operation_id, ids[4]);
        assert_eq!(recent[2].operation_id, ids[2]);
    }

    #[test]
    fn rows_cannot_be_updated_or_deleted() {
        let log = make_log();
        log.append(&make_entry("aaa", OperationStatus::Success)).unwrap();

        let update = log
            .conn
            .execute("UPDATE audit_log SET status = 'failed'", []);
        assert!(update.unwrap_err().to_string().contains("append-only"));

        let delete = log.conn.execute("DELETE FROM audit_log", []);
        assert!(delete.unwrap_err().to_string().contains("append-only"));

        assert_eq!(log.count().unwrap(), 1);
    }

    #[test]
    fn duplicate_operation_id_is_rejected() {
        let log = make_log();
        let entry = make_entry("aaa", OperationStatus::Success);
        log.append(&entry).unwrap();
        assert!(matches!(log.append(&entry), Err(TypekeepError::Database(_))));
    }

    #[test]
    fn export_writes_one_line_per_entry() {
        let log = make_log();
        log.append(&make_entry("aaa", OperationStatus::Success)).unwrap();
        log.append(&make_entry("bbb", OperationStatus::Cancelled)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        assert_eq!(log.export_jsonl(&path).unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: AuditEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.status, OperationStatus::Cancelled);
    }
}
