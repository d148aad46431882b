// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of seals, unseals, denials, tamper
// detections, verifications and anchor updates.
//
//   audit_log(
//     id        INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp TEXT    NOT NULL,   -- RFC 3339
//     action    TEXT    NOT NULL,   -- AuditAction keyword
//     subject   TEXT    NOT NULL,   -- proof code, or draft id before one exists
//     success   INTEGER NOT NULL,
//     details   TEXT                -- never codes, keys or viewer lists
//   )
//
// There is no UPDATE or DELETE path.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use docseal_core::error::{Result, SealError};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS audit_log (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT    NOT NULL,
        action    TEXT    NOT NULL,
        subject   TEXT    NOT NULL,
        success   INTEGER NOT NULL,
        details   TEXT
    );
    CREATE INDEX IF NOT EXISTS audit_log_by_subject ON audit_log (subject);
"#;

const SELECT_COLUMNS: &str = "SELECT id, timestamp, action, subject, success, details FROM audit_log";

fn db_err(e: rusqlite::Error) -> SealError {
    SealError::Database(e.to_string())
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A registration finished (or failed, with `success = false`).
    Seal,
    /// An authorised requester received plaintext.
    Unseal,
    AccessDenied,
    /// A digest or authentication tag did not match at retrieval.
    IntegrityFailure,
    AnchorUpdate,
    /// A presented document was checked against its record.
    Verify,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seal => "seal",
            Self::Unseal => "unseal",
            Self::AccessDenied => "access_denied",
            Self::IntegrityFailure => "integrity_failure",
            Self::AnchorUpdate => "anchor_update",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self> {
        [
            Self::Seal,
            Self::Unseal,
            Self::AccessDenied,
            Self::IntegrityFailure,
            Self::AnchorUpdate,
            Self::Verify,
        ]
        .into_iter()
        .find(|action| action.as_str() == s)
        .ok_or_else(|| SealError::validation(format!("unknown audit action {s:?}")))
    }
}

/// One row of the trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub subject: String,
    pub success: bool,
    pub details: Option<String>,
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    let timestamp: String = row.get(1)?;
    let action: String = row.get(2)?;

    Ok(AuditEntry {
        id: row.get(0)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
        action: action
            .parse()
            .map_err(|e: SealError| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        subject: row.get(3)?,
        success: row.get::<_, i32>(4)? != 0,
        details: row.get(5)?,
    })
}

/// Append-only audit log.
///
/// Holds a bare `Connection`, so it is `Send` but not `Sync`; share it behind
/// a `Mutex`.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`, in WAL mode.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        Ok(Self { conn })
    }

    /// Append an entry stamped with the current time.
    #[instrument(skip_all, fields(%action, %subject, success))]
    pub fn record(
        &self,
        action: AuditAction,
        subject: &str,
        success: bool,
        details: Option<&str>,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO audit_log (timestamp, action, subject, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    Utc::now().to_rfc3339(),
                    action.as_str(),
                    subject,
                    success,
                    details
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Every entry about `subject`, in the order recorded.
    pub fn entries_for_subject(&self, subject: &str) -> Result<Vec<AuditEntry>> {
        self.query(&format!("{SELECT_COLUMNS} WHERE subject = ?1 ORDER BY id ASC"), params![subject])
    }

    /// The `limit` latest entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        self.query(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"), params![limit])
    }

    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<AuditEntry>> {
        let mut stmt = self.conn.prepare(sql).map_err(db_err)?;
        let entries = stmt
            .query_map(args, row_to_entry)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_history_for_one_proof_code() {
        let log = AuditLog::open_in_memory().unwrap();
        log.record(AuditAction::Seal, "PRF-A", true, None).unwrap();
        log.record(AuditAction::Seal, "PRF-B", true, None).unwrap();
        log.record(
            AuditAction::AccessDenied,
            "PRF-A",
            false,
            Some("owner_only: requester is not the owner"),
        )
        .unwrap();
        log.record(AuditAction::Unseal, "PRF-A", true, None).unwrap();

        let history: Vec<_> = log
            .entries_for_subject("PRF-A")
            .unwrap()
            .into_iter()
            .map(|e| (e.action, e.success))
            .collect();
        assert_eq!(
            history,
            vec![
                (AuditAction::Seal, true),
                (AuditAction::AccessDenied, false),
                (AuditAction::Unseal, true),
            ]
        );
        assert_eq!(log.count().unwrap(), 4);
    }

    #[test]
    fn recent_entries_are_newest_first_and_limited() {
        let log = AuditLog::open_in_memory().unwrap();
        for i in 0..5 {
            log.record(AuditAction::Verify, &format!("PRF-{i}"), i % 2 == 0, None)
                .unwrap();
        }

        let recent = log.recent_entries(3).unwrap();
        let subjects: Vec<_> = recent.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, ["PRF-4", "PRF-3", "PRF-2"]);
        assert!(recent[0].success);
        assert!(!recent[1].success);
    }

    #[test]
    fn details_are_kept_verbatim() {
        let log = AuditLog::open_in_memory().unwrap();
        log.record(AuditAction::AnchorUpdate, "PRF-X", true, Some("0xf00d"))
            .unwrap();
        let entry = &log.entries_for_subject("PRF-X").unwrap()[0];
        assert_eq!(entry.details.as_deref(), Some("0xf00d"));
        assert!(entry.timestamp <= Utc::now());
    }

    #[test]
    fn action_keywords_parse_back() {
        for action in [
            AuditAction::Seal,
            AuditAction::Unseal,
            AuditAction::AccessDenied,
            AuditAction::IntegrityFailure,
            AuditAction::AnchorUpdate,
            AuditAction::Verify,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("print".parse::<AuditAction>().is_err());
    }

    #[test]
    fn on_disk_log_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.db");
        AuditLog::open(&path)
            .unwrap()
            .record(AuditAction::Seal, "PRF-1", true, None)
            .unwrap();
        assert_eq!(AuditLog::open(&path).unwrap().count().unwrap(), 1);
    }
}
