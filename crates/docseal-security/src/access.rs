// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Access evaluator: decides whether a credential may unseal an object and,
// if so, releases the object's data key.
//
//   owner_only        identity == owner                     (case-insensitive)
//   specific_wallets  identity == owner || identity in list (case-insensitive)
//   secret_code       code == stored code                   (case-sensitive, constant time)
//
// Under secret_code a presented code is checked before anything else and a
// mismatch denies outright; identity never rescues a wrong code.  Under the
// identity modes a presented code is ignored.

use std::sync::Arc;

use docseal_core::error::{Result, SealError};
use docseal_core::types::{AccessPolicy, Credential, DenyReason, ObjectId, SealObject};
use subtle::ConstantTimeEq;
use tracing::{debug, instrument, warn};

use crate::cipher::SealKey;
use crate::policy::PolicyStore;

/// Identity comparison used by every identity-based rule.
pub fn identities_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Constant-time comparison of secret codes.
///
/// When lengths differ a dummy comparison keeps the timing independent of
/// how much of the code was right.
pub fn codes_match(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    presented.ct_eq(expected).into()
}

/// Reject credentials that are absent or malformed before touching the store.
pub fn check_credential(credential: &Credential) -> Result<()> {
    if credential.is_empty() {
        return Err(SealError::MissingCredential);
    }
    if let Some(identity) = &credential.identity {
        if identity.trim().is_empty() {
            return Err(SealError::validation("requester identity must not be empty"));
        }
    }
    if let Some(code) = &credential.secret_code {
        if code.is_empty() {
            return Err(SealError::validation("secret code must not be empty"));
        }
    }
    Ok(())
}

/// Apply `object`'s policy to `credential`. Pure; no key material involved.
pub fn authorize(object: &SealObject, credential: &Credential) -> std::result::Result<(), DenyReason> {
    let identity = credential.identity.as_deref();

    match &object.policy {
        AccessPolicy::SecretCode { code } => match credential.secret_code.as_deref() {
            Some(presented) if codes_match(presented, code.expose()) => Ok(()),
            Some(_) => Err(DenyReason::CodeMismatch),
            None => Err(DenyReason::CodeRequired),
        },
        AccessPolicy::OwnerOnly => match identity {
            Some(id) if identities_match(id, &object.owner_identity) => Ok(()),
            Some(_) => Err(DenyReason::NotOwner),
            None => Err(DenyReason::IdentityRequired),
        },
        AccessPolicy::SpecificWallets { allowed_viewers } => match identity {
            Some(id)
                if identities_match(id, &object.owner_identity)
                    || allowed_viewers.iter().any(|v| identities_match(id, v)) =>
            {
                Ok(())
            }
            Some(_) => Err(DenyReason::NotAViewer),
            None => Err(DenyReason::IdentityRequired),
        },
    }
}

/// Evaluates decryption requests against the policy store.
///
/// Read-only: any number of evaluations may run concurrently.
#[derive(Clone)]
pub struct AccessEvaluator {
    store: Arc<PolicyStore>,
}

impl AccessEvaluator {
    pub fn new(store: Arc<PolicyStore>) -> Self {
        Self { store }
    }

    /// Decide whether `credential` may unseal `object_id`.
    ///
    /// Returns the object's data key on grant.  Fails with
    /// `MissingCredential`, `Validation`, `NotFound` or `AccessDenied`; the
    /// denial names the mode and the failed check but never the code or the
    /// viewer list.
    #[instrument(skip(self, credential), fields(%object_id))]
    pub fn evaluate(&self, object_id: &ObjectId, credential: &Credential) -> Result<SealKey> {
        check_credential(credential)?;
        let (object, key) = self.store.lookup_with_key(object_id)?;
        let mode = object.policy.mode();

        match authorize(&object, credential) {
            Ok(()) => {
                debug!(%mode, "access granted");
                Ok(key)
            }
            Err(reason) => {
                warn!(%mode, %reason, "access denied");
                Err(SealError::AccessDenied { mode, reason })
            }
        }
    }
}
