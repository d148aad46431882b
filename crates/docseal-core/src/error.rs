// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Docseal.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{DenyReason, PolicyMode};

/// Number of hex characters of a digest shown in integrity messages.
const DIGEST_PREFIX_LEN: usize = 12;

/// The kind of thing a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resource {
    SealObject,
    ProofRecord,
    Blob,
    Draft,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SealObject => "seal object",
            Self::ProofRecord => "proof record",
            Self::Blob => "blob",
            Self::Draft => "registration draft",
        })
    }
}

/// Why a tamper check failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityFailure {
    /// The SHA-256 digest of the bytes differs from the recorded one.
    DigestMismatch { expected: String, actual: String },
    /// The AEAD tag did not verify (tampered ciphertext or wrong key).
    AuthenticationFailed,
    /// The buffer is too short to hold an IV and a tag.
    Truncated { len: usize },
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DigestMismatch { expected, actual } => write!(
                f,
                "digest mismatch (expected {}…, got {}…)",
                digest_prefix(expected),
                digest_prefix(actual)
            ),
            Self::AuthenticationFailed => f.write_str("authentication tag did not verify"),
            Self::Truncated { len } => write!(f, "sealed buffer truncated ({len} bytes)"),
        }
    }
}

fn digest_prefix(digest: &str) -> &str {
    match digest.char_indices().nth(DIGEST_PREFIX_LEN) {
        Some((idx, _)) => &digest[..idx],
        None => digest,
    }
}

/// Coarse classification of a [`SealError`], stable across message changes.
///
/// Callers branch on this rather than on message text, e.g. to tell
/// "you don't have access" from "the data is corrupted".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    NotFound,
    MissingCredential,
    AccessDenied,
    Integrity,
    Validation,
    Encryption,
    Storage,
    Anchor,
    Database,
    Io,
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not_found",
            Self::MissingCredential => "missing_credential",
            Self::AccessDenied => "access_denied",
            Self::Integrity => "integrity",
            Self::Validation => "validation",
            Self::Encryption => "encryption",
            Self::Storage => "storage",
            Self::Anchor => "anchor",
            Self::Database => "database",
            Self::Io => "io",
            Self::Serialization => "serialization",
        })
    }
}

/// Top-level error type for all Docseal operations.
#[derive(Debug, Error)]
pub enum SealError {
    // -- Lookup --
    #[error("{resource} not found: {id}")]
    NotFound { resource: Resource, id: String },

    // -- Access control --
    #[error("no credential supplied: provide an identity or a secret code")]
    MissingCredential,

    #[error("access denied under {mode} policy: {reason}")]
    AccessDenied { mode: PolicyMode, reason: DenyReason },

    // -- Integrity --
    #[error("content failed tamper check: {0}")]
    Integrity(IntegrityFailure),

    #[error("invalid input: {0}")]
    Validation(String),

    // -- Cryptography --
    #[error("encryption failed: {0}")]
    Encryption(String),

    // -- Collaborators --
    #[error("blob storage error: {0}")]
    Storage(String),

    #[error("anchoring failed: {0}")]
    Anchor(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SealError {
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn digest_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::Integrity(IntegrityFailure::DigestMismatch {
            expected: expected.into(),
            actual: actual.into(),
        })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::MissingCredential => ErrorKind::MissingCredential,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::Integrity(_) => ErrorKind::Integrity,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Encryption(_) => ErrorKind::Encryption,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Anchor(_) => ErrorKind::Anchor,
            Self::Database(_) => ErrorKind::Database,
            Self::Io(_) => ErrorKind::Io,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SealError>;
