// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-ledger: proof records and the registration/retrieval lifecycle.
//
// Defines the contracts for the blob store, anchor service and proof
// persistence, ships reference implementations of each, and wires them to
// the seal layer in `ProofLifecycle`.

pub mod anchor;
pub mod blobs;
pub mod journal;
pub mod lifecycle;
pub mod records;
pub mod traits;

pub use anchor::LocalAnchor;
pub use blobs::{FsBlobStore, MemoryBlobStore};
pub use journal::RegistrationJournal;
pub use lifecycle::ProofLifecycle;
pub use records::SqliteProofStore;
pub use traits::{AnchorService, BlobStore, ProofStore};
