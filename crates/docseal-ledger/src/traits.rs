// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contracts for the collaborators the lifecycle delegates to.
//
// The blob store, the anchor service and proof persistence are opaque to the
// seal layer.  Implementations are injected into `ProofLifecycle` at
// construction; reference implementations live in `blobs`, `anchor` and
// `records`.  Errors are returned with their kind intact and are never
// retried by the lifecycle.

use docseal_core::error::Result;
use docseal_core::types::{AnchorReceipt, AnchorRequest, ProofCode, ProofRecord, StoredBlob};

/// Content-addressed storage for sealed blobs.
///
/// The store is untrusted between a `put` and a later `get`: callers verify
/// whatever comes back.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` and return where they went. `name` is a hint only.
    fn put(&self, bytes: &[u8], name: &str) -> Result<StoredBlob>;

    /// Fetch the bytes for `content_id`. Returns `Ok(None)` if absent.
    fn get(&self, content_id: &str) -> Result<Option<Vec<u8>>>;
}

/// Anchors a registration and issues its proof code.
pub trait AnchorService: Send + Sync {
    /// Bind the hashes, content id, owner and seal object together.
    ///
    /// The returned proof code must be globally unique.
    fn register(&self, request: &AnchorRequest) -> Result<AnchorReceipt>;
}

/// Keyed persistence for proof records.
pub trait ProofStore: Send + Sync {
    /// Persist a new record. Fails if the proof code is already taken.
    fn create(&self, record: ProofRecord) -> Result<ProofRecord>;

    /// Returns `Ok(None)` if no record has this code.
    fn get_by_code(&self, code: &ProofCode) -> Result<Option<ProofRecord>>;

    /// All records registered by `owner` (case-insensitive), newest first.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<ProofRecord>>;

    /// Replace the anchor transaction id; the only permitted mutation.
    ///
    /// Returns `Ok(None)` if no record has this code. Concurrent updates to
    /// the same code are serialised and the last one wins.
    fn update_anchor_tx_id(&self, code: &ProofCode, tx_id: &str) -> Result<Option<ProofRecord>>;
}
