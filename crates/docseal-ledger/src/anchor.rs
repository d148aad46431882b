// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Local anchor: a stand-in for the on-chain registration call.
//
// Issues a provisional transaction id (to be replaced by a confirmed one
// through `ProofLifecycle::confirm_anchor`) and a proof code that is unique
// among the codes this anchor has issued.

use std::collections::HashSet;
use std::sync::Mutex;

use docseal_core::error::{Result, SealError};
use docseal_core::types::{AnchorReceipt, AnchorRequest, ProofCode};
use docseal_security::hash_bytes;
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};

use crate::traits::AnchorService;

/// Prefix marking a transaction id that has not been confirmed yet.
pub const PROVISIONAL_PREFIX: &str = "provisional:";

/// Prefix of every proof code issued here.
const PROOF_CODE_PREFIX: &str = "PRF-";

/// Random bytes behind each proof code (rendered as uppercase hex).
const PROOF_CODE_BYTES: usize = 6;

/// Whether `tx_id` is still a provisional placeholder.
pub fn is_provisional(tx_id: &str) -> bool {
    tx_id.starts_with(PROVISIONAL_PREFIX)
}

/// In-process anchor service.
///
/// Only the issued codes are retained; the request itself is committed to
/// through the transaction id.
#[derive(Default)]
pub struct LocalAnchor {
    issued: Mutex<HashSet<ProofCode>>,
}

impl LocalAnchor {
    pub fn new() -> Self {
        Self::default()
    }

    fn random_code() -> Result<ProofCode> {
        let mut bytes = [0u8; PROOF_CODE_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| SealError::Anchor("proof code generation failed".into()))?;
        Ok(ProofCode::new(format!(
            "{PROOF_CODE_PREFIX}{}",
            hex::encode_upper(bytes)
        )))
    }
}

impl AnchorService for LocalAnchor {
    #[instrument(skip_all, fields(seal_object_id = %request.seal_object_id))]
    fn register(&self, request: &AnchorRequest) -> Result<AnchorReceipt> {
        for (field, value) in [
            ("plaintext_hash", &request.plaintext_hash),
            ("content_id", &request.content_id),
            ("owner_identity", &request.owner_identity),
            ("ciphertext_hash", &request.ciphertext_hash),
        ] {
            if value.is_empty() {
                return Err(SealError::validation(format!("anchor request missing {field}")));
            }
        }

        let mut issued = self
            .issued
            .lock()
            .map_err(|_| SealError::Anchor("anchor registry lock poisoned".into()))?;

        let proof_code = loop {
            let candidate = Self::random_code()?;
            if !issued.contains(&candidate) {
                break candidate;
            }
        };

        // tx id = H(request json || proof code)
        let mut preimage = serde_json::to_vec(request)?;
        preimage.extend_from_slice(proof_code.as_str().as_bytes());
        let anchor_tx_id = format!("{PROVISIONAL_PREFIX}0x{}", hash_bytes(&preimage));

        issued.insert(proof_code.clone());
        debug!(%proof_code, "anchor registered");

        Ok(AnchorReceipt {
            anchor_tx_id,
            proof_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::types::ObjectId;

    fn request() -> AnchorRequest {
        AnchorRequest {
            plaintext_hash: hash_bytes(b"plain"),
            content_id: hash_bytes(b"sealed"),
            owner_identity: "0xabc".into(),
            seal_object_id: ObjectId::new(),
            ciphertext_hash: hash_bytes(b"sealed"),
        }
    }

    #[test]
    fn issues_provisional_receipt() {
        let anchor = LocalAnchor::new();
        let req = request();
        let receipt = anchor.register(&req).unwrap();

        assert!(is_provisional(&receipt.anchor_tx_id));
        assert!(receipt.proof_code.as_str().starts_with("PRF-"));
        assert_eq!(receipt.proof_code.as_str().len(), 4 + 2 * PROOF_CODE_BYTES);
        assert!(anchor.issued.lock().unwrap().contains(&receipt.proof_code));
    }

    #[test]
    fn codes_and_tx_ids_are_unique() {
        let anchor = LocalAnchor::new();
        let req = request();
        let a = anchor.register(&req).unwrap();
        let b = anchor.register(&req).unwrap();
        assert_ne!(a.proof_code, b.proof_code);
        assert_ne!(a.anchor_tx_id, b.anchor_tx_id);
    }

    #[test]
    fn only_codes_are_retained() {
        let anchor = LocalAnchor::new();
        let codes: HashSet<_> = (0..50)
            .map(|_| anchor.register(&request()).unwrap().proof_code)
            .collect();
        assert_eq!(codes.len(), 50);
        assert_eq!(*anchor.issued.lock().unwrap(), codes);
    }

    #[test]
    fn incomplete_request_rejected() {
        let anchor = LocalAnchor::new();
        let mut req = request();
        req.ciphertext_hash.clear();
        assert!(matches!(anchor.register(&req), Err(SealError::Validation(_))));
    }

    #[test]
    fn confirmed_ids_are_not_provisional() {
        assert!(!is_provisional("0xdeadbeef"));
        assert!(is_provisional("provisional:0x00"));
    }
}
