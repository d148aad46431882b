// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reference blob stores.
//
// Both stores are content-addressed: the content id is the SHA-256 hex digest
// of the bytes at `put` time.  Neither re-checks that digest on `get`; the
// lifecycle does that against the digest recorded in the proof record.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::PathBuf;
use std::sync::RwLock;

use docseal_core::error::{Result, SealError};
use docseal_core::types::StoredBlob;
use docseal_security::hash_bytes;
use tracing::{debug, instrument};

use crate::traits::BlobStore;

/// Content ids are lowercase SHA-256 hex; anything else is rejected before it
/// can reach a filesystem path.
fn validate_content_id(content_id: &str) -> Result<()> {
    let well_formed = content_id.len() == 64
        && content_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(SealError::validation(format!("malformed content id {content_id:?}")))
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Blob store held in process memory.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the bytes stored under `content_id` without changing the id,
    /// the way a faulty or compromised store would.  Returns `false` if
    /// nothing was stored there.
    pub fn overwrite(&self, content_id: &str, bytes: Vec<u8>) -> Result<bool> {
        let mut blobs = self.write_lock()?;
        match blobs.get_mut(content_id) {
            Some(slot) => {
                *slot = bytes;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop a blob. Returns `false` if it was not there.
    pub fn remove(&self, content_id: &str) -> Result<bool> {
        Ok(self.write_lock()?.remove(content_id).is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_lock()?.is_empty())
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .read()
            .map_err(|_| SealError::Storage("blob map lock poisoned".into()))
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>>> {
        self.blobs
            .write()
            .map_err(|_| SealError::Storage("blob map lock poisoned".into()))
    }
}

impl BlobStore for MemoryBlobStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn put(&self, bytes: &[u8], name: &str) -> Result<StoredBlob> {
        let content_id = hash_bytes(bytes);
        self.write_lock()?
            .entry(content_id.clone())
            .or_insert_with(|| bytes.to_vec());

        debug!(%content_id, "blob stored in memory");
        Ok(StoredBlob {
            storage_url: format!("mem://{content_id}"),
            content_id,
        })
    }

    fn get(&self, content_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.read_lock()?.get(content_id).cloned())
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Blob store writing one file per blob, named by content id.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the blob directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .map_err(|e| SealError::Storage(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    fn path_for(&self, content_id: &str) -> Result<PathBuf> {
        validate_content_id(content_id)?;
        Ok(self.root.join(content_id))
    }
}

impl BlobStore for FsBlobStore {
    #[instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn put(&self, bytes: &[u8], name: &str) -> Result<StoredBlob> {
        let content_id = hash_bytes(bytes);
        let path = self.path_for(&content_id)?;

        if !path.exists() {
            std::fs::write(&path, bytes)
                .map_err(|e| SealError::Storage(format!("write {}: {e}", path.display())))?;
        }

        debug!(%content_id, "blob written to disk");
        Ok(StoredBlob {
            storage_url: format!("file://{}", path.display()),
            content_id,
        })
    }

    fn get(&self, content_id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(content_id)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(SealError::Storage(format!("read {}: {e}", path.display()))),
        }
    }
}
