// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for Docseal: seal objects, access policies, credentials
// and proof records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{ErrorKind, SealError};

/// Unique identifier for a seal object (one encryption event).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(pub Uuid);

impl ObjectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ObjectId {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SealError::validation(format!("malformed object id {s:?}: {e}")))
    }
}

/// Shareable identifier of a proof record, assigned by the anchor service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofCode(String);

impl ProofCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProofCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProofCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// Access policies
// ---------------------------------------------------------------------------

/// The three mutually exclusive access modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    OwnerOnly,
    SpecificWallets,
    SecretCode,
}

impl PolicyMode {
    /// Storage / wire keyword for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OwnerOnly => "owner_only",
            Self::SpecificWallets => "specific_wallets",
            Self::SecretCode => "secret_code",
        }
    }
}

impl fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyMode {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner_only" => Ok(Self::OwnerOnly),
            "specific_wallets" => Ok(Self::SpecificWallets),
            "secret_code" => Ok(Self::SecretCode),
            other => Err(SealError::validation(format!("unknown policy mode {other:?}"))),
        }
    }
}

/// A secret access code. Zeroised on drop and never printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretCode(String);

impl SecretCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The code itself. Only hand this to the document owner or to a
    /// comparison.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretCode([REDACTED])")
    }
}

/// Access policy attached to a seal object at creation. Immutable.
#[derive(Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Only the owner may decrypt.
    OwnerOnly,
    /// The owner and the listed identities may decrypt.
    SpecificWallets { allowed_viewers: Vec<String> },
    /// Anyone presenting the exact code may decrypt.
    SecretCode { code: SecretCode },
}

impl AccessPolicy {
    pub fn mode(&self) -> PolicyMode {
        match self {
            Self::OwnerOnly => PolicyMode::OwnerOnly,
            Self::SpecificWallets { .. } => PolicyMode::SpecificWallets,
            Self::SecretCode { .. } => PolicyMode::SecretCode,
        }
    }
}

// Viewer lists and codes stay out of logs.
impl fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerOnly => f.write_str("OwnerOnly"),
            Self::SpecificWallets { allowed_viewers } => f
                .debug_struct("SpecificWallets")
                .field("viewer_count", &allowed_viewers.len())
                .finish(),
            Self::SecretCode { .. } => f.write_str("SecretCode([REDACTED])"),
        }
    }
}

/// Which check refused an access request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Requester identity is not the owner.
    NotOwner,
    /// Requester identity is neither the owner nor an allowed viewer.
    NotAViewer,
    /// A secret code was presented and did not match.
    CodeMismatch,
    /// The policy needs a secret code and none was presented.
    CodeRequired,
    /// The policy needs an identity and none was presented.
    IdentityRequired,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotOwner => "requester is not the owner",
            Self::NotAViewer => "requester is not on the viewer list",
            Self::CodeMismatch => "secret code does not match",
            Self::CodeRequired => "a secret code is required",
            Self::IdentityRequired => "a requester identity is required",
        })
    }
}

/// What a requester presents to unseal a document: an identity, a secret
/// code, or both.
#[derive(Clone, Default)]
pub struct Credential {
    pub identity: Option<String>,
    pub secret_code: Option<String>,
}

impl Credential {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn identity(identity: impl Into<String>) -> Self {
        Self {
            identity: Some(identity.into()),
            secret_code: None,
        }
    }

    pub fn secret_code(code: impl Into<String>) -> Self {
        Self {
            identity: None,
            secret_code: Some(code.into()),
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_secret_code(mut self, code: impl Into<String>) -> Self {
        self.secret_code = Some(code.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none() && self.secret_code.is_none()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("secret_code", &self.secret_code.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Seal objects and proof records
// ---------------------------------------------------------------------------

/// Public view of one encryption event. The key never leaves the policy
/// store through this type.
#[derive(Debug, Clone)]
pub struct SealObject {
    pub object_id: ObjectId,
    pub owner_identity: String,
    pub policy: AccessPolicy,
    pub created_at: DateTime<Utc>,
}

/// A registered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRecord {
    pub proof_code: ProofCode,
    pub owner_address: String,
    /// SHA-256 of the original document, computed before encryption.
    pub plaintext_hash: String,
    /// SHA-256 of the sealed blob as stored.
    pub ciphertext_hash: String,
    pub seal_object_id: ObjectId,
    pub content_id: String,
    pub storage_url: String,
    pub anchor_tx_id: String,
    pub created_at: DateTime<Utc>,
}

/// Where the blob store put a sealed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlob {
    pub content_id: String,
    pub storage_url: String,
}

/// Everything the anchor service binds together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRequest {
    pub plaintext_hash: String,
    pub content_id: String,
    pub owner_identity: String,
    pub seal_object_id: ObjectId,
    pub ciphertext_hash: String,
}

/// Result of anchoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorReceipt {
    pub anchor_tx_id: String,
    pub proof_code: ProofCode,
}

// ---------------------------------------------------------------------------
// Registration and retrieval
// ---------------------------------------------------------------------------

/// Access policy as requested at registration. A secret code may be left
/// out, in which case one is generated.
#[derive(Clone)]
pub enum AccessRequest {
    OwnerOnly,
    SpecificWallets { allowed_viewers: Vec<String> },
    SecretCode { code: Option<String> },
}

impl AccessRequest {
    pub fn mode(&self) -> PolicyMode {
        match self {
            Self::OwnerOnly => PolicyMode::OwnerOnly,
            Self::SpecificWallets { .. } => PolicyMode::SpecificWallets,
            Self::SecretCode { .. } => PolicyMode::SecretCode,
        }
    }
}

impl fmt::Debug for AccessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OwnerOnly => f.write_str("OwnerOnly"),
            Self::SpecificWallets { allowed_viewers } => f
                .debug_struct("SpecificWallets")
                .field("viewer_count", &allowed_viewers.len())
                .finish(),
            Self::SecretCode { code } => f
                .debug_struct("SecretCode")
                .field("supplied", &code.is_some())
                .finish(),
        }
    }
}

/// A document to register.
#[derive(Clone)]
pub struct RegistrationRequest {
    pub document: Vec<u8>,
    pub document_name: String,
    pub owner: String,
    pub access: AccessRequest,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("document_len", &self.document.len())
            .field("document_name", &self.document_name)
            .field("owner", &self.owner)
            .field("access", &self.access)
            .finish()
    }
}

/// Outcome of a registration.
///
/// `generated_code` is the only place a generated secret code is ever
/// surfaced; it cannot be recovered afterwards.
#[derive(Debug, Clone)]
pub struct RegistrationReceipt {
    pub record: ProofRecord,
    pub generated_code: Option<SecretCode>,
}

/// Decrypted document handed back to an authorised requester.
#[derive(Clone)]
pub struct UnsealedDocument {
    pub proof_code: ProofCode,
    pub document_type: DocumentType,
    pub bytes: Vec<u8>,
}

impl UnsealedDocument {
    pub fn media_type(&self) -> &'static str {
        self.document_type.mime_type()
    }
}

impl fmt::Debug for UnsealedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnsealedDocument")
            .field("proof_code", &self.proof_code)
            .field("document_type", &self.document_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Result of checking a presented document against a proof record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub proof_code: ProofCode,
    pub matches: bool,
    pub presented_hash: String,
    pub recorded_hash: String,
    pub anchor_tx_id: String,
    pub registered_at: DateTime<Utc>,
}

/// Document types recognised when serving unsealed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    PlainText,
    /// Anything else, served as an opaque binary.
    Other,
}

impl DocumentType {
    /// MIME type string for the delivered payload.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::PlainText => "text/plain",
            Self::Other => "application/octet-stream",
        }
    }

    /// Infer document type from leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Self::Png
        } else if bytes.starts_with(b"II*\0") || bytes.starts_with(b"MM\0*") {
            Self::Tiff
        } else if !bytes.is_empty() && std::str::from_utf8(bytes).is_ok() {
            Self::PlainText
        } else {
            Self::Other
        }
    }
}

// ---------------------------------------------------------------------------
// Registration journal
// ---------------------------------------------------------------------------

/// Last stage a registration draft completed. Stages advance in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStage {
    Started,
    Sealed,
    Uploaded,
    Anchored,
    Persisted,
}

impl DraftStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Sealed => "sealed",
            Self::Uploaded => "uploaded",
            Self::Anchored => "anchored",
            Self::Persisted => "persisted",
        }
    }
}

impl fmt::Display for DraftStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DraftStage {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "sealed" => Ok(Self::Sealed),
            "uploaded" => Ok(Self::Uploaded),
            "anchored" => Ok(Self::Anchored),
            "persisted" => Ok(Self::Persisted),
            other => Err(SealError::validation(format!("unknown draft stage {other:?}"))),
        }
    }
}

/// Why a draft stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftFailure {
    pub kind: ErrorKind,
    pub message: String,
}

/// Progress of one registration through its non-atomic steps.
///
/// Anything short of `Persisted` may have left a sealed object, a blob or
/// an anchor behind without a proof record pointing at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDraft {
    pub draft_id: Uuid,
    pub owner: String,
    pub plaintext_hash: String,
    pub stage: DraftStage,
    pub seal_object_id: Option<ObjectId>,
    pub content_id: Option<String>,
    pub proof_code: Option<ProofCode>,
    pub failure: Option<DraftFailure>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
