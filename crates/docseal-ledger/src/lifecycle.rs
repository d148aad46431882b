// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Proof record lifecycle: the only place the seal layer and the external
// collaborators meet.
//
// Registration:  hash -> resolve policy -> create + encrypt -> hash ciphertext
//                -> upload -> anchor -> persist
// Retrieval:     record -> blob -> access -> ciphertext hash -> decrypt
//                -> plaintext hash
//
// Nothing here retries or compensates.  Each registration is tracked in the
// journal so a failure partway through names what it left behind.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use docseal_core::SealConfig;
use docseal_core::error::{Resource, Result, SealError};
use docseal_core::types::{
    AccessPolicy, AccessRequest, AnchorRequest, Credential, DocumentType, ProofCode, ProofRecord,
    RegistrationDraft, RegistrationReceipt, RegistrationRequest, SecretCode, UnsealedDocument,
    VerificationReport,
};
use docseal_security::audit::AuditEntry;
use docseal_security::policy::validate_policy;
use docseal_security::{
    AccessEvaluator, AuditAction, AuditLog, PolicyStore, decrypt, encrypt, generate_secret_code,
    hash_bytes, verify_hash,
};

use crate::journal::RegistrationJournal;
use crate::records::SqliteProofStore;
use crate::traits::{AnchorService, BlobStore, ProofStore};

/// Orchestrates registration, retrieval, verification and anchor updates.
///
/// Cheap to clone; every store is shared behind an `Arc`.
#[derive(Clone)]
pub struct ProofLifecycle {
    policies: Arc<PolicyStore>,
    evaluator: AccessEvaluator,
    blobs: Arc<dyn BlobStore>,
    anchor: Arc<dyn AnchorService>,
    proofs: Arc<dyn ProofStore>,
    journal: Arc<RegistrationJournal>,
    audit_log: Option<Arc<Mutex<AuditLog>>>,
    config: SealConfig,
}

impl ProofLifecycle {
    /// Wire the lifecycle to its stores and collaborators.
    pub fn new(
        policies: Arc<PolicyStore>,
        blobs: Arc<dyn BlobStore>,
        anchor: Arc<dyn AnchorService>,
        proofs: Arc<dyn ProofStore>,
        journal: Arc<RegistrationJournal>,
        config: SealConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            evaluator: AccessEvaluator::new(Arc::clone(&policies)),
            policies,
            blobs,
            anchor,
            proofs,
            journal,
            audit_log: None,
            config,
        })
    }

    /// Lifecycle backed entirely by one SQLite file plus the given blob
    /// store and anchor.
    pub fn open(
        database: impl AsRef<Path>,
        blobs: Arc<dyn BlobStore>,
        anchor: Arc<dyn AnchorService>,
        config: SealConfig,
    ) -> Result<Self> {
        let database = database.as_ref();
        Self::new(
            Arc::new(PolicyStore::open(database)?),
            blobs,
            anchor,
            Arc::new(SqliteProofStore::open(database)?),
            Arc::new(RegistrationJournal::open(database)?),
            config,
        )
    }

    /// Same, with every SQLite store in memory.
    pub fn in_memory(
        blobs: Arc<dyn BlobStore>,
        anchor: Arc<dyn AnchorService>,
        config: SealConfig,
    ) -> Result<Self> {
        Self::new(
            Arc::new(PolicyStore::open_in_memory()?),
            blobs,
            anchor,
            Arc::new(SqliteProofStore::open_in_memory()?),
            Arc::new(RegistrationJournal::open_in_memory()?),
            config,
        )
    }

    /// Attach an audit log. Ignored when `audit_enabled` is off.
    pub fn with_audit(mut self, audit_log: AuditLog) -> Self {
        if self.config.audit_enabled {
            self.audit_log = Some(Arc::new(Mutex::new(audit_log)));
        }
        self
    }

    // -- Registration --------------------------------------------------------

    /// Seal, store, anchor and record a document.
    ///
    /// A generated secret code is returned in the receipt and nowhere else.
    #[instrument(skip_all, fields(owner = %request.owner, len = request.document.len(), mode = %request.access.mode()))]
    pub fn register(&self, request: RegistrationRequest) -> Result<RegistrationReceipt> {
        if request.owner.trim().is_empty() {
            return Err(SealError::validation("owner identity must not be empty"));
        }

        let plaintext_hash = hash_bytes(&request.document);
        let (policy, generated_code) = self.resolve_policy(&request.owner, request.access.clone())?;

        let draft_id = self.journal.open_draft(&request.owner, &plaintext_hash)?;
        match self.register_steps(draft_id, &request, plaintext_hash, policy) {
            Ok(record) => {
                info!(proof_code = %record.proof_code, "document registered");
                self.audit(AuditAction::Seal, record.proof_code.as_str(), true, None);
                Ok(RegistrationReceipt {
                    record,
                    generated_code,
                })
            }
            Err(e) => {
                if let Err(journal_err) = self.journal.mark_failed(draft_id, &e) {
                    error!("failed to record registration failure: {journal_err}");
                }
                self.audit(
                    AuditAction::Seal,
                    &draft_id.to_string(),
                    false,
                    Some(&format!("{}", e.kind())),
                );
                Err(e)
            }
        }
    }

    fn register_steps(
        &self,
        draft_id: Uuid,
        request: &RegistrationRequest,
        plaintext_hash: String,
        policy: AccessPolicy,
    ) -> Result<ProofRecord> {
        let (seal_object_id, key) = self.policies.create(&request.owner, policy)?;
        let sealed = encrypt(&request.document, &key)?;
        drop(key);
        self.journal.mark_sealed(draft_id, seal_object_id)?;

        // Trusted on write; checked again on every retrieval.
        let ciphertext_hash = hash_bytes(&sealed);

        let blob = self.blobs.put(&sealed, &request.document_name)?;
        self.journal.mark_uploaded(draft_id, &blob.content_id)?;

        let receipt = self.anchor.register(&AnchorRequest {
            plaintext_hash: plaintext_hash.clone(),
            content_id: blob.content_id.clone(),
            owner_identity: request.owner.clone(),
            seal_object_id,
            ciphertext_hash: ciphertext_hash.clone(),
        })?;
        if receipt.proof_code.as_str().trim().is_empty() || receipt.anchor_tx_id.trim().is_empty() {
            return Err(SealError::Anchor(
                "anchor returned an empty proof code or transaction id".into(),
            ));
        }
        self.journal.mark_anchored(draft_id, &receipt.proof_code)?;

        let record = self.proofs.create(ProofRecord {
            proof_code: receipt.proof_code,
            owner_address: request.owner.clone(),
            plaintext_hash,
            ciphertext_hash,
            seal_object_id,
            content_id: blob.content_id,
            storage_url: blob.storage_url,
            anchor_tx_id: receipt.anchor_tx_id,
            created_at: Utc::now(),
        })?;
        self.journal.mark_persisted(draft_id)?;
        Ok(record)
    }

    /// Turn the requested access into a storable policy, generating a code
    /// if `secret_code` was asked for without one.
    fn resolve_policy(
        &self,
        owner: &str,
        access: AccessRequest,
    ) -> Result<(AccessPolicy, Option<SecretCode>)> {
        let (policy, generated) = match access {
            AccessRequest::OwnerOnly => (AccessPolicy::OwnerOnly, None),
            AccessRequest::SpecificWallets { allowed_viewers } => {
                (AccessPolicy::SpecificWallets { allowed_viewers }, None)
            }
            AccessRequest::SecretCode { code: Some(code) } => (
                AccessPolicy::SecretCode {
                    code: SecretCode::new(code),
                },
                None,
            ),
            AccessRequest::SecretCode { code: None } => {
                let code = generate_secret_code(self.config.generated_code_len)?;
                (
                    AccessPolicy::SecretCode { code: code.clone() },
                    Some(code),
                )
            }
        };
        validate_policy(owner, &policy)?;
        Ok((policy, generated))
    }

    // -- Retrieval -----------------------------------------------------------

    /// Verify and decrypt a registered document for an authorised requester.
    ///
    /// The stored ciphertext is hashed and compared to the recorded digest
    /// before any decryption is attempted.
    #[instrument(skip(self, credential), fields(%proof_code))]
    pub fn retrieve(&self, proof_code: &ProofCode, credential: &Credential) -> Result<UnsealedDocument> {
        let record = self.require_record(proof_code)?;
        let sealed = self
            .blobs
            .get(&record.content_id)?
            .ok_or_else(|| SealError::not_found(Resource::Blob, &record.content_id))?;

        let key = match self.evaluator.evaluate(&record.seal_object_id, credential) {
            Ok(key) => key,
            Err(e) => {
                if let SealError::AccessDenied { mode, reason } = &e {
                    self.audit(
                        AuditAction::AccessDenied,
                        proof_code.as_str(),
                        false,
                        Some(&format!("{mode}: {reason}")),
                    );
                }
                return Err(e);
            }
        };

        if let Err(e) = verify_hash(&sealed, &record.ciphertext_hash) {
            warn!("stored ciphertext failed its digest check");
            self.audit(
                AuditAction::IntegrityFailure,
                proof_code.as_str(),
                false,
                Some("ciphertext digest"),
            );
            return Err(e);
        }

        let plaintext = match decrypt(&sealed, &key).and_then(|plaintext| {
            verify_hash(&plaintext, &record.plaintext_hash)?;
            Ok(plaintext)
        }) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(kind = %e.kind(), "unsealing failed");
                self.audit(
                    AuditAction::IntegrityFailure,
                    proof_code.as_str(),
                    false,
                    Some("decryption or plaintext digest"),
                );
                return Err(e);
            }
        };

        info!(len = plaintext.len(), "document retrieved");
        self.audit(AuditAction::Unseal, proof_code.as_str(), true, None);

        Ok(UnsealedDocument {
            proof_code: record.proof_code,
            document_type: DocumentType::sniff(&plaintext),
            bytes: plaintext,
        })
    }

    // -- Verification and queries --------------------------------------------

    /// Check a presented document against the recorded plaintext digest.
    ///
    /// Needs no credential and never decrypts anything.
    #[instrument(skip(self, document), fields(%proof_code, len = document.len()))]
    pub fn verify_document(&self, proof_code: &ProofCode, document: &[u8]) -> Result<VerificationReport> {
        let record = self.require_record(proof_code)?;
        let presented_hash = hash_bytes(document);
        let matches = verify_hash(document, &record.plaintext_hash).is_ok();

        info!(matches, "document verified against proof record");
        self.audit(AuditAction::Verify, proof_code.as_str(), matches, None);

        Ok(VerificationReport {
            proof_code: record.proof_code,
            matches,
            presented_hash,
            recorded_hash: record.plaintext_hash,
            anchor_tx_id: record.anchor_tx_id,
            registered_at: record.created_at,
        })
    }

    /// Look up a record by proof code.
    pub fn record(&self, proof_code: &ProofCode) -> Result<ProofRecord> {
        self.require_record(proof_code)
    }

    /// Every record registered by `owner`, newest first.
    pub fn records_for_owner(&self, owner: &str) -> Result<Vec<ProofRecord>> {
        if owner.trim().is_empty() {
            return Err(SealError::validation("owner identity must not be empty"));
        }
        self.proofs.list_by_owner(owner)
    }

    /// Replace the anchor transaction id of a record, e.g. once a provisional
    /// anchor is confirmed.
    #[instrument(skip(self), fields(%proof_code))]
    pub fn confirm_anchor(&self, proof_code: &ProofCode, anchor_tx_id: &str) -> Result<ProofRecord> {
        if anchor_tx_id.trim().is_empty() {
            return Err(SealError::validation("anchor transaction id must not be empty"));
        }
        let record = self
            .proofs
            .update_anchor_tx_id(proof_code, anchor_tx_id)?
            .ok_or_else(|| SealError::not_found(Resource::ProofRecord, proof_code))?;

        info!("anchor transaction id replaced");
        self.audit(
            AuditAction::AnchorUpdate,
            proof_code.as_str(),
            true,
            Some(anchor_tx_id),
        );
        Ok(record)
    }

    /// Registrations that stopped before their proof record was written.
    pub fn incomplete_registrations(&self) -> Result<Vec<RegistrationDraft>> {
        self.journal.incomplete_drafts()
    }

    // -- Audit trail ---------------------------------------------------------

    /// Most recent audit entries, newest first. Empty when auditing is off.
    pub fn recent_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        match &self.audit_log {
            Some(log) => lock_audit(log)?.recent_entries(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Audit entries for one proof code (or draft id), oldest first.
    pub fn audit_entries_for(&self, subject: &str) -> Result<Vec<AuditEntry>> {
        match &self.audit_log {
            Some(log) => lock_audit(log)?.entries_for_subject(subject),
            None => Ok(Vec::new()),
        }
    }

    // -- Internal helpers ----------------------------------------------------

    fn require_record(&self, proof_code: &ProofCode) -> Result<ProofRecord> {
        self.proofs
            .get_by_code(proof_code)?
            .ok_or_else(|| SealError::not_found(Resource::ProofRecord, proof_code))
    }

    /// Record an audit entry.  Audit failures are logged but never fail the
    /// operation being audited.
    fn audit(&self, action: AuditAction, subject: &str, success: bool, details: Option<&str>) {
        let Some(audit_log) = &self.audit_log else {
            return;
        };
        if let Err(e) =
            lock_audit(audit_log).and_then(|log| log.record(action, subject, success, details))
        {
            error!(error = %e, "failed to record audit entry");
        }
    }
}

fn lock_audit(log: &Mutex<AuditLog>) -> Result<MutexGuard<'_, AuditLog>> {
    log.lock()
        .map_err(|_| SealError::Database("audit log lock poisoned".into()))
}
