// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent proof records backed by SQLite.
//
// Records are keyed by proof code and never deleted.  The only column ever
// updated is `anchor_tx_id`.  Each seal object backs at most one record
// (`seal_object_id` is UNIQUE).

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::{debug, info, instrument};

use docseal_core::error::{Result, SealError};
use docseal_core::types::{ObjectId, ProofCode, ProofRecord};

use crate::traits::ProofStore;

/// SQLite schema for the proof records table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS proof_records (
        proof_code      TEXT PRIMARY KEY,
        owner_address   TEXT NOT NULL,
        plaintext_hash  TEXT NOT NULL,
        ciphertext_hash TEXT NOT NULL,
        seal_object_id  TEXT NOT NULL UNIQUE,
        content_id      TEXT NOT NULL,
        storage_url     TEXT NOT NULL,
        anchor_tx_id    TEXT NOT NULL,
        created_at      TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS proof_records_by_owner
        ON proof_records (owner_address COLLATE NOCASE);
"#;

const SELECT_COLUMNS: &str = "SELECT proof_code, owner_address, plaintext_hash, ciphertext_hash,
        seal_object_id, content_id, storage_url, anchor_tx_id, created_at
 FROM proof_records";

fn db_err(context: &str, e: rusqlite::Error) -> SealError {
    SealError::Database(format!("{context}: {e}"))
}

/// Proof record persistence backed by a SQLite database.
///
/// `rusqlite::Connection` is `Send` but not `Sync`, so it is held behind a
/// `Mutex`; this also gives each anchor update exclusive access.
pub struct SqliteProofStore {
    conn: Mutex<Connection>,
}

impl SqliteProofStore {
    /// Open (or create) the proof record database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| db_err("open", e))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| db_err("WAL pragma", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;

        info!("proof record database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("open in-memory", e))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| db_err("create table", e))?;

        debug!("in-memory proof record database opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SealError::Database("proof store lock poisoned".into()))
    }
}

fn fetch(conn: &Connection, code: &ProofCode) -> Result<Option<ProofRecord>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE proof_code = ?1"),
        params![code.as_str()],
        row_to_proof_record,
    )
    .optional()
    .map_err(|e| db_err("get_by_code", e))
}

impl ProofStore for SqliteProofStore {
    #[instrument(skip(self, record), fields(proof_code = %record.proof_code))]
    fn create(&self, record: ProofRecord) -> Result<ProofRecord> {
        let result = self.conn()?.execute(
            "INSERT INTO proof_records (proof_code, owner_address, plaintext_hash,
             ciphertext_hash, seal_object_id, content_id, storage_url, anchor_tx_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.proof_code.as_str(),
                record.owner_address,
                record.plaintext_hash,
                record.ciphertext_hash,
                record.seal_object_id.to_string(),
                record.content_id,
                record.storage_url,
                record.anchor_tx_id,
                record.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                info!("proof record persisted");
                Ok(record)
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(SealError::validation(format!(
                    "proof code {} or seal object {} is already registered",
                    record.proof_code, record.seal_object_id
                )))
            }
            Err(e) => Err(db_err("insert proof record", e)),
        }
    }

    #[instrument(skip(self), fields(proof_code = %code))]
    fn get_by_code(&self, code: &ProofCode) -> Result<Option<ProofRecord>> {
        let conn = self.conn()?;
        fetch(&conn, code)
    }

    #[instrument(skip(self))]
    fn list_by_owner(&self, owner: &str) -> Result<Vec<ProofRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE owner_address = ?1 COLLATE NOCASE
                 ORDER BY created_at DESC"
            ))
            .map_err(|e| db_err("prepare list_by_owner", e))?;

        let records = stmt
            .query_map(params![owner], row_to_proof_record)
            .map_err(|e| db_err("query list_by_owner", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("collect rows", e))?;

        debug!(count = records.len(), "listed proof records");
        Ok(records)
    }

    #[instrument(skip(self), fields(proof_code = %code))]
    fn update_anchor_tx_id(&self, code: &ProofCode, tx_id: &str) -> Result<Option<ProofRecord>> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE proof_records SET anchor_tx_id = ?1 WHERE proof_code = ?2",
                params![tx_id, code.as_str()],
            )
            .map_err(|e| db_err("update anchor_tx_id", e))?;

        if rows == 0 {
            return Ok(None);
        }

        debug!("anchor tx id replaced");
        fetch(&conn, code)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a SQLite row to a `ProofRecord`.
///
/// Column indices must match `SELECT_COLUMNS`.
fn row_to_proof_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProofRecord> {
    let proof_code: String = row.get(0)?;
    let seal_object_id: String = row.get(4)?;
    let created_at: String = row.get(8)?;

    let seal_object_id: ObjectId = seal_object_id.parse().map_err(|e: SealError| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ProofRecord {
        proof_code: ProofCode::new(proof_code),
        owner_address: row.get(1)?,
        plaintext_hash: row.get(2)?,
        ciphertext_hash: row.get(3)?,
        seal_object_id,
        content_id: row.get(5)?,
        storage_url: row.get(6)?,
        anchor_tx_id: row.get(7)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Helper: a minimal record with a given code and owner.
    fn test_record(code: &str, owner: &str) -> ProofRecord {
        ProofRecord {
            proof_code: ProofCode::new(code),
            owner_address: owner.into(),
            plaintext_hash: "aa".repeat(32),
            ciphertext_hash: "bb".repeat(32),
            seal_object_id: ObjectId::new(),
            content_id: "bb".repeat(32),
            storage_url: format!("mem://{}", "bb".repeat(32)),
            anchor_tx_id: "provisional:0x01".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_by_code() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        let record = test_record("PRF-000001", "0xabc");
        store.create(record.clone()).expect("create");

        let found = store
            .get_by_code(&record.proof_code)
            .expect("get_by_code")
            .expect("found");
        assert_eq!(found.proof_code, record.proof_code);
        assert_eq!(found.seal_object_id, record.seal_object_id);
        assert_eq!(found.plaintext_hash, record.plaintext_hash);
    }

    #[test]
    fn unknown_code_returns_none() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        assert!(store.get_by_code(&ProofCode::new("PRF-NOPE")).unwrap().is_none());
    }

    #[test]
    fn duplicate_code_is_rejected() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        store.create(test_record("PRF-DUP", "0xabc")).unwrap();
        let err = store.create(test_record("PRF-DUP", "0xdef")).unwrap_err();
        assert!(matches!(err, SealError::Validation(_)));
    }

    #[test]
    fn shared_seal_object_is_rejected() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        let first = test_record("PRF-A", "0xabc");
        let mut second = test_record("PRF-B", "0xabc");
        second.seal_object_id = first.seal_object_id;
        store.create(first).unwrap();
        assert!(store.create(second).is_err());
    }

    #[test]
    fn list_by_owner_ignores_case() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        store.create(test_record("PRF-1", "0xAbC")).unwrap();
        store.create(test_record("PRF-2", "0xabc")).unwrap();
        store.create(test_record("PRF-3", "0xdef")).unwrap();

        let mine = store.list_by_owner("0XABC").unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|r| r.owner_address.eq_ignore_ascii_case("0xabc")));
    }

    #[test]
    fn anchor_update_replaces_only_the_tx_id() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        let record = test_record("PRF-UP", "0xabc");
        store.create(record.clone()).unwrap();

        let updated = store
            .update_anchor_tx_id(&record.proof_code, "0xconfirmed")
            .unwrap()
            .expect("record exists");
        assert_eq!(updated.anchor_tx_id, "0xconfirmed");
        assert_eq!(updated.owner_address, record.owner_address);
        assert_eq!(updated.plaintext_hash, record.plaintext_hash);
        assert_eq!(updated.ciphertext_hash, record.ciphertext_hash);
        assert_eq!(updated.seal_object_id, record.seal_object_id);
        assert_eq!(updated.content_id, record.content_id);
        assert_eq!(updated.storage_url, record.storage_url);
    }

    #[test]
    fn anchor_update_on_unknown_code_is_none() {
        let store = SqliteProofStore::open_in_memory().expect("open in-memory db");
        assert!(
            store
                .update_anchor_tx_id(&ProofCode::new("PRF-GHOST"), "0x1")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn concurrent_anchor_updates_leave_one_winner() {
        let store = Arc::new(SqliteProofStore::open_in_memory().expect("open in-memory db"));
        let code = ProofCode::new("PRF-RACE");
        store.create(test_record(code.as_str(), "0xabc")).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let code = code.clone();
                std::thread::spawn(move || {
                    store
                        .update_anchor_tx_id(&code, &format!("0xconfirmed{i}"))
                        .unwrap()
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread panicked");
        }

        let final_tx = store.get_by_code(&code).unwrap().unwrap().anchor_tx_id;
        assert!(final_tx.starts_with("0xconfirmed"));
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proofs.db");
        let record = test_record("PRF-DISK", "0xabc");
        {
            let store = SqliteProofStore::open(&path).unwrap();
            store.create(record.clone()).unwrap();
        }
        let store = SqliteProofStore::open(&path).unwrap();
        assert!(store.get_by_code(&record.proof_code).unwrap().is_some());
    }
}
