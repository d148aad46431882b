// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docseal-security: the seal layer.
//
// AES-256-GCM sealing of document bytes, the policy store that owns every
// data key, access evaluation over the three policy modes, SHA-256 integrity
// checks, and the tamper-evident audit trail.

pub mod access;
pub mod audit;
pub mod cipher;
pub mod integrity;
pub mod policy;

pub use access::AccessEvaluator;
pub use audit::{AuditAction, AuditLog};
pub use cipher::{SealKey, decrypt, encrypt};
pub use integrity::{hash_bytes, verify_hash};
pub use policy::{PolicyStore, generate_secret_code};
