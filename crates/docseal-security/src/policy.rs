// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Policy store: maps each seal object to its owner, data key and access
// policy, backed by SQLite.
//
// Schema:
//   seal_objects(
//     object_id       TEXT PRIMARY KEY,  -- UUID v4
//     owner_identity  TEXT NOT NULL,
//     encryption_key  BLOB NOT NULL,     -- 32-byte AES-256 key
//     policy_mode     TEXT NOT NULL,     -- owner_only | specific_wallets | secret_code
//     allowed_viewers TEXT NOT NULL,     -- JSON array, empty unless specific_wallets
//     secret_code     TEXT,              -- only for secret_code
//     created_at      TEXT NOT NULL      -- RFC 3339
//   )
//
// Rows are written once and never updated or deleted.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use docseal_core::error::{Resource, Result, SealError};
use docseal_core::types::{AccessPolicy, ObjectId, PolicyMode, SealObject, SecretCode};
use ring::rand::{SecureRandom, SystemRandom};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use crate::cipher::SealKey;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS seal_objects (
        object_id       TEXT PRIMARY KEY,
        owner_identity  TEXT NOT NULL,
        encryption_key  BLOB NOT NULL,
        policy_mode     TEXT NOT NULL,
        allowed_viewers TEXT NOT NULL DEFAULT '[]',
        secret_code     TEXT,
        created_at      TEXT NOT NULL
    )
"#;

/// Convert a `rusqlite::Error` into a `SealError::Database`.
fn db_err(e: rusqlite::Error) -> SealError {
    SealError::Database(e.to_string())
}

/// Generate a secret access code of `hex_len` lowercase hex characters from
/// the OS CSPRNG.
pub fn generate_secret_code(hex_len: usize) -> Result<SecretCode> {
    if hex_len == 0 || hex_len % 2 != 0 {
        return Err(SealError::validation(format!(
            "secret code length must be a positive even number, got {hex_len}"
        )));
    }
    let mut bytes = vec![0u8; hex_len / 2];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| SealError::Encryption("secret code generation failed".into()))?;
    Ok(SecretCode::new(hex::encode(bytes)))
}

/// Check the parameters of a policy before it is stored.
pub fn validate_policy(owner_identity: &str, policy: &AccessPolicy) -> Result<()> {
    if owner_identity.trim().is_empty() {
        return Err(SealError::validation("owner identity must not be empty"));
    }
    match policy {
        AccessPolicy::OwnerOnly => Ok(()),
        // An empty list leaves only the owner able to unseal.
        AccessPolicy::SpecificWallets { allowed_viewers } => {
            if allowed_viewers.iter().any(|v| v.trim().is_empty()) {
                return Err(SealError::validation("viewer identities must not be empty"));
            }
            Ok(())
        }
        AccessPolicy::SecretCode { code } => {
            if code.expose().is_empty() {
                return Err(SealError::validation("secret code must not be empty"));
            }
            Ok(())
        }
    }
}

/// SQLite-backed store of seal objects and their data keys.
///
/// The connection sits behind a `Mutex` so the store can be shared across
/// threads; `create` is a single INSERT under that lock, so a half-written
/// policy is never visible.
pub struct PolicyStore {
    conn: Mutex<Connection>,
}

impl PolicyStore {
    /// Open (or create) the policy database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err)?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        info!("policy store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory policy database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_TABLE_SQL).map_err(db_err)?;

        debug!("in-memory policy store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SealError::Database("policy store lock poisoned".into()))
    }

    /// Create a seal object for `owner_identity` under `policy`.
    ///
    /// Generates a fresh object id and data key and stores them together.
    /// The key is returned so the caller can encrypt with it straight away;
    /// afterwards it is only reachable through access evaluation.
    #[instrument(skip(self, policy), fields(mode = %policy.mode()))]
    pub fn create(&self, owner_identity: &str, policy: AccessPolicy) -> Result<(ObjectId, SealKey)> {
        validate_policy(owner_identity, &policy)?;

        let object_id = ObjectId::new();
        let key = SealKey::generate()?;

        let viewers_json = match &policy {
            AccessPolicy::SpecificWallets { allowed_viewers } => serde_json::to_string(allowed_viewers)?,
            _ => "[]".to_owned(),
        };
        let secret_code = match &policy {
            AccessPolicy::SecretCode { code } => Some(code.expose().to_owned()),
            _ => None,
        };

        self.conn()?
            .execute(
                "INSERT INTO seal_objects (object_id, owner_identity, encryption_key,
                 policy_mode, allowed_viewers, secret_code, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    object_id.to_string(),
                    owner_identity,
                    &key.expose_secret()[..],
                    policy.mode().as_str(),
                    viewers_json,
                    secret_code,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        info!(%object_id, "seal object created");
        Ok((object_id, key))
    }

    /// Look up a seal object. The data key is not included.
    #[instrument(skip(self), fields(%object_id))]
    pub fn lookup(&self, object_id: &ObjectId) -> Result<SealObject> {
        self.lookup_with_key(object_id).map(|(object, _key)| object)
    }

    /// Look up a seal object together with its data key.
    pub(crate) fn lookup_with_key(&self, object_id: &ObjectId) -> Result<(SealObject, SealKey)> {
        let row = self
            .conn()?
            .query_row(
                "SELECT owner_identity, encryption_key, policy_mode, allowed_viewers,
                        secret_code, created_at
                 FROM seal_objects WHERE object_id = ?1",
                params![object_id.to_string()],
                |row| {
                    Ok(StoredSeal {
                        owner_identity: row.get(0)?,
                        key: row.get(1)?,
                        mode: row.get(2)?,
                        viewers_json: row.get(3)?,
                        secret_code: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?
            .ok_or_else(|| SealError::not_found(Resource::SealObject, object_id))?;

        row.into_seal(*object_id)
    }

    /// Number of seal objects stored.
    pub fn count(&self) -> Result<u64> {
        self.conn()?
            .query_row("SELECT COUNT(*) FROM seal_objects", [], |row| row.get(0))
            .map_err(db_err)
    }
}

/// Raw column values of one `seal_objects` row.
struct StoredSeal {
    owner_identity: String,
    key: Vec<u8>,
    mode: String,
    viewers_json: String,
    secret_code: Option<String>,
    created_at: String,
}

impl StoredSeal {
    fn into_seal(self, object_id: ObjectId) -> Result<(SealObject, SealKey)> {
        let mut key_bytes = self.key;
        let key = SealKey::from_slice(&key_bytes);
        zeroize::Zeroize::zeroize(&mut key_bytes);
        let key = key.map_err(|e| SealError::Database(format!("corrupt key for {object_id}: {e}")))?;

        let mode: PolicyMode = self
            .mode
            .parse()
            .map_err(|e| SealError::Database(format!("corrupt policy for {object_id}: {e}")))?;

        let policy = match mode {
            PolicyMode::OwnerOnly => AccessPolicy::OwnerOnly,
            PolicyMode::SpecificWallets => AccessPolicy::SpecificWallets {
                allowed_viewers: serde_json::from_str(&self.viewers_json)?,
            },
            PolicyMode::SecretCode => AccessPolicy::SecretCode {
                code: SecretCode::new(self.secret_code.ok_or_else(|| {
                    SealError::Database(format!("secret_code policy {object_id} has no code"))
                })?),
            },
        };

        let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SealError::Database(format!("bad timestamp for {object_id}: {e}")))?;

        Ok((
            SealObject {
                object_id,
                owner_identity: self.owner_identity,
                policy,
                created_at,
            },
            key,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn make_store() -> PolicyStore {
        PolicyStore::open_in_memory().expect("open in-memory policy store")
    }

    #[test]
    fn create_and_lookup() {
        let store = make_store();
        let policy = AccessPolicy::SpecificWallets {
            allowed_viewers: vec!["0x111".into(), "0x222".into()],
        };
        let (id, _key) = store.create("0xabc", policy.clone()).unwrap();

        let object = store.lookup(&id).unwrap();
        assert_eq!(object.object_id, id);
        assert_eq!(object.owner_identity, "0xabc");
        assert_eq!(object.policy, policy);
    }

    #[test]
    fn stored_key_matches_returned_key() {
        let store = make_store();
        let (id, key) = store.create("0xabc", AccessPolicy::OwnerOnly).unwrap();
        let (_, stored) = store.lookup_with_key(&id).unwrap();
        assert_eq!(stored.expose_secret(), key.expose_secret());
    }

    #[test]
    fn secret_code_survives_storage() {
        let store = make_store();
        let code = SecretCode::new("AbC123dEf456");
        let (id, _) = store
            .create("0xabc", AccessPolicy::SecretCode { code: code.clone() })
            .unwrap();
        match store.lookup(&id).unwrap().policy {
            AccessPolicy::SecretCode { code: stored } => assert_eq!(stored, code),
            other => panic!("unexpected policy {other:?}"),
        }
    }

    #[test]
    fn unknown_object_is_not_found() {
        let store = make_store();
        let err = store.lookup(&ObjectId::new()).unwrap_err();
        assert!(matches!(
            err,
            SealError::NotFound {
                resource: Resource::SealObject,
                ..
            }
        ));
    }

    #[test]
    fn invalid_policies_are_rejected() {
        let store = make_store();
        assert!(matches!(
            store.create("  ", AccessPolicy::OwnerOnly),
            Err(SealError::Validation(_))
        ));
        assert!(matches!(
            store.create(
                "0xabc",
                AccessPolicy::SpecificWallets {
                    allowed_viewers: vec!["0x111".into(), " ".into()]
                }
            ),
            Err(SealError::Validation(_))
        ));
        assert!(matches!(
            store.create(
                "0xabc",
                AccessPolicy::SecretCode {
                    code: SecretCode::new("")
                }
            ),
            Err(SealError::Validation(_))
        ));
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn generated_codes_are_hex_of_requested_length() {
        let code = generate_secret_code(16).unwrap();
        assert_eq!(code.expose().len(), 16);
        assert!(code.expose().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(code, generate_secret_code(16).unwrap());
        assert!(generate_secret_code(15).is_err());
        assert!(generate_secret_code(0).is_err());
    }

    #[test]
    fn concurrent_creates_yield_distinct_ids() {
        let store = Arc::new(make_store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| store.create(&format!("0xowner{i}"), AccessPolicy::OwnerOnly).unwrap().0)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let ids: HashSet<ObjectId> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("thread panicked"))
            .collect();
        assert_eq!(ids.len(), 80);
        assert_eq!(store.count().unwrap(), 80);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.db");

        let id = {
            let store = PolicyStore::open(&path).unwrap();
            store.create("0xabc", AccessPolicy::OwnerOnly).unwrap().0
        };

        let reopened = PolicyStore::open(&path).unwrap();
        assert_eq!(reopened.lookup(&id).unwrap().owner_identity, "0xabc");
    }
}
