// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Registration journal: records how far each registration got.
//
// Registration touches four independent stores (policy, blob, anchor, proof
// records) with no transaction spanning them.  Every registration opens a
// draft here and advances it after each step, so a failure partway leaves a
// row naming what was created and what went wrong.  Nothing is rolled back.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use docseal_core::error::{ErrorKind, Resource, Result, SealError};
use docseal_core::types::{DraftFailure, DraftStage, ObjectId, ProofCode, RegistrationDraft};

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS registration_drafts (
        draft_id        TEXT PRIMARY KEY,
        owner           TEXT NOT NULL,
        plaintext_hash  TEXT NOT NULL,
        stage           TEXT NOT NULL,
        seal_object_id  TEXT,
        content_id      TEXT,
        proof_code      TEXT,
        failure_kind    TEXT,
        failure_message TEXT,
        created_at      TEXT NOT NULL,
        updated_at      TEXT NOT NULL
    )
"#;

const SELECT_COLUMNS: &str = "SELECT draft_id, owner, plaintext_hash, stage, seal_object_id,
        content_id, proof_code, failure_kind, failure_message, created_at, updated_at
 FROM registration_drafts";

fn db_err(e: rusqlite::Error) -> SealError {
    SealError::Database(e.to_string())
}

/// SQLite-backed journal of registration drafts.
pub struct RegistrationJournal {
    conn: Mutex<Connection>,
}

impl RegistrationJournal {
    /// Open (or create) the journal at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        info!("registration journal opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SealError::Database("journal lock poisoned".into()))
    }

    /// Start a draft for a registration by `owner` of a document hashing to
    /// `plaintext_hash`.
    #[instrument(skip(self, plaintext_hash))]
    pub fn open_draft(&self, owner: &str, plaintext_hash: &str) -> Result<Uuid> {
        let draft_id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.conn()?
            .execute(
                "INSERT INTO registration_drafts
                 (draft_id, owner, plaintext_hash, stage, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    draft_id.to_string(),
                    owner,
                    plaintext_hash,
                    DraftStage::Started.as_str(),
                    now
                ],
            )
            .map_err(db_err)?;

        debug!(%draft_id, "draft opened");
        Ok(draft_id)
    }

    pub fn mark_sealed(&self, draft_id: Uuid, object_id: ObjectId) -> Result<()> {
        self.advance(
            draft_id,
            DraftStage::Sealed,
            "seal_object_id",
            &object_id.to_string(),
        )
    }

    pub fn mark_uploaded(&self, draft_id: Uuid, content_id: &str) -> Result<()> {
        self.advance(draft_id, DraftStage::Uploaded, "content_id", content_id)
    }

    pub fn mark_anchored(&self, draft_id: Uuid, proof_code: &ProofCode) -> Result<()> {
        self.advance(
            draft_id,
            DraftStage::Anchored,
            "proof_code",
            proof_code.as_str(),
        )
    }

    pub fn mark_persisted(&self, draft_id: Uuid) -> Result<()> {
        let rows = self
            .conn()?
            .execute(
                "UPDATE registration_drafts SET stage = ?1, updated_at = ?2 WHERE draft_id = ?3",
                params![
                    DraftStage::Persisted.as_str(),
                    Utc::now().to_rfc3339(),
                    draft_id.to_string()
                ],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(SealError::not_found(Resource::Draft, draft_id));
        }
        Ok(())
    }

    /// Record why a draft stopped. The stage stays where it was.
    #[instrument(skip_all, fields(%draft_id))]
    pub fn mark_failed(&self, draft_id: Uuid, error: &SealError) -> Result<()> {
        let kind = serde_json::to_string(&error.kind())?;
        let rows = self
            .conn()?
            .execute(
                "UPDATE registration_drafts
                 SET failure_kind = ?1, failure_message = ?2, updated_at = ?3
                 WHERE draft_id = ?4",
                params![
                    kind,
                    error.to_string(),
                    Utc::now().to_rfc3339(),
                    draft_id.to_string()
                ],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(SealError::not_found(Resource::Draft, draft_id));
        }

        warn!(kind = %error.kind(), "registration draft failed");
        Ok(())
    }

    /// Fetch one draft.
    pub fn get(&self, draft_id: Uuid) -> Result<RegistrationDraft> {
        self.conn()?
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE draft_id = ?1"),
                params![draft_id.to_string()],
                row_to_draft,
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| SealError::not_found(Resource::Draft, draft_id))
    }

    /// Drafts that never reached `Persisted`, oldest first.
    pub fn incomplete_drafts(&self) -> Result<Vec<RegistrationDraft>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE stage != ?1 ORDER BY created_at ASC"
            ))
            .map_err(db_err)?;

        let drafts = stmt
            .query_map(params![DraftStage::Persisted.as_str()], row_to_draft)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        Ok(drafts)
    }

    fn advance(&self, draft_id: Uuid, stage: DraftStage, column: &str, value: &str) -> Result<()> {
        // `column` is always one of our literals, never caller input.
        let sql = format!(
            "UPDATE registration_drafts SET stage = ?1, {column} = ?2, updated_at = ?3
             WHERE draft_id = ?4"
        );
        let rows = self
            .conn()?
            .execute(
                &sql,
                params![
                    stage.as_str(),
                    value,
                    Utc::now().to_rfc3339(),
                    draft_id.to_string()
                ],
            )
            .map_err(db_err)?;
        if rows == 0 {
            return Err(SealError::not_found(Resource::Draft, draft_id));
        }

        debug!(%draft_id, %stage, "draft advanced");
        Ok(())
    }
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn row_to_draft(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistrationDraft> {
    let draft_id: String = row.get(0)?;
    let stage: String = row.get(3)?;
    let seal_object_id: Option<String> = row.get(4)?;
    let proof_code: Option<String> = row.get(6)?;
    let failure_kind: Option<String> = row.get(7)?;
    let failure_message: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    let failure = match failure_kind {
        Some(kind) => {
            let kind: ErrorKind = serde_json::from_str(&kind).map_err(|e| conversion_err(7, e))?;
            Some(DraftFailure {
                kind,
                message: failure_message.unwrap_or_default(),
            })
        }
        None => None,
    };

    Ok(RegistrationDraft {
        draft_id: Uuid::parse_str(&draft_id).map_err(|e| conversion_err(0, e))?,
        owner: row.get(1)?,
        plaintext_hash: row.get(2)?,
        stage: stage.parse().map_err(|e: SealError| conversion_err(3, e))?,
        seal_object_id: seal_object_id
            .map(|s| s.parse::<ObjectId>())
            .transpose()
            .map_err(|e| conversion_err(4, e))?,
        content_id: row.get(5)?,
        proof_code: proof_code.map(ProofCode::new),
        failure,
        created_at: parse_timestamp(9, &created_at)?,
        updated_at: parse_timestamp(10, &updated_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_walks_every_stage() {
        let journal = RegistrationJournal::open_in_memory().unwrap();
        let id = journal.open_draft("0xabc", "aa").unwrap();
        assert_eq!(journal.get(id).unwrap().stage, DraftStage::Started);

        let object_id = ObjectId::new();
        journal.mark_sealed(id, object_id).unwrap();
        journal.mark_uploaded(id, "cid").unwrap();
        journal.mark_anchored(id, &ProofCode::new("PRF-1")).unwrap();

        let draft = journal.get(id).unwrap();
        assert_eq!(draft.stage, DraftStage::Anchored);
        assert_eq!(draft.seal_object_id, Some(object_id));
        assert_eq!(draft.content_id.as_deref(), Some("cid"));
        assert_eq!(draft.proof_code, Some(ProofCode::new("PRF-1")));
        assert_eq!(journal.incomplete_drafts().unwrap().len(), 1);

        journal.mark_persisted(id).unwrap();
        assert_eq!(journal.get(id).unwrap().stage, DraftStage::Persisted);
        assert!(journal.incomplete_drafts().unwrap().is_empty());
    }

    #[test]
    fn failure_keeps_stage_and_records_kind() {
        let journal = RegistrationJournal::open_in_memory().unwrap();
        let id = journal.open_draft("0xabc", "aa").unwrap();
        journal.mark_sealed(id, ObjectId::new()).unwrap();
        journal
            .mark_failed(id, &SealError::Storage("disk full".into()))
            .unwrap();

        let draft = journal.get(id).unwrap();
        assert_eq!(draft.stage, DraftStage::Sealed);
        let failure = draft.failure.expect("failure recorded");
        assert_eq!(failure.kind, ErrorKind::Storage);
        assert!(failure.message.contains("disk full"));
    }

    #[test]
    fn unknown_draft_is_not_found() {
        let journal = RegistrationJournal::open_in_memory().unwrap();
        let ghost = Uuid::new_v4();
        assert!(matches!(
            journal.get(ghost),
            Err(SealError::NotFound {
                resource: Resource::Draft,
                ..
            })
        ));
        assert!(journal.mark_persisted(ghost).is_err());
        assert!(journal.mark_uploaded(ghost, "cid").is_err());
    }
}
