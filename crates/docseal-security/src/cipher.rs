// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cipher engine: AES-256-GCM (via `ring`) over opaque byte buffers.
//
// Sealed layout:
//
//   +-----------+----------------------+-----------+
//   |  IV (12)  |  encrypted body (N)  |  tag (16) |
//   +-----------+----------------------+-----------+
//
// A fresh IV is drawn from the OS CSPRNG for every call.  Any change to the
// IV, body or tag, or the wrong key, makes `decrypt` fail with an integrity
// error rather than returning garbage.

use docseal_core::error::{IntegrityFailure, Result, SealError};
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::{debug, instrument};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// GCM nonce length.
pub const IV_LEN: usize = 12;

/// GCM authentication tag length.
pub const TAG_LEN: usize = 16;

/// Smallest valid sealed buffer (empty plaintext).
pub const MIN_SEALED_LEN: usize = IV_LEN + TAG_LEN;

/// A 256-bit data key, zeroised on drop.
///
/// There is no `Clone` and `Debug` prints nothing of the key material.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SealKey([u8; KEY_LEN]);

impl SealKey {
    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; KEY_LEN];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| SealError::Encryption("key generation failed".into()))?;
        Ok(Self(bytes))
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Rebuild a key from stored material.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            SealError::Encryption(format!("key must be {KEY_LEN} bytes, got {}", bytes.len()))
        })?;
        Ok(Self(array))
    }

    /// Raw key bytes, for the cipher and the policy store only.
    pub(crate) fn expose_secret(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SealKey([REDACTED])")
    }
}

fn aead_key(key: &SealKey) -> Result<LessSafeKey> {
    UnboundKey::new(&AES_256_GCM, key.expose_secret())
        .map(LessSafeKey::new)
        .map_err(|_| SealError::Encryption("AES-256-GCM rejected the key".into()))
}

/// Encrypt `plaintext` under `key` and return `iv || body || tag`.
#[instrument(skip_all, fields(plaintext_len = plaintext.len()))]
pub fn encrypt(plaintext: &[u8], key: &SealKey) -> Result<Vec<u8>> {
    let sealing_key = aead_key(key)?;

    let mut iv = [0u8; IV_LEN];
    SystemRandom::new()
        .fill(&mut iv)
        .map_err(|_| SealError::Encryption("IV generation failed".into()))?;

    let mut body = plaintext.to_vec();
    let tag = sealing_key
        .seal_in_place_separate_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut body)
        .map_err(|_| SealError::Encryption("AES-256-GCM seal failed".into()))?;

    let mut sealed = Vec::with_capacity(IV_LEN + body.len() + TAG_LEN);
    sealed.extend_from_slice(&iv);
    sealed.extend_from_slice(&body);
    sealed.extend_from_slice(tag.as_ref());

    debug!(sealed_len = sealed.len(), "encryption complete");
    Ok(sealed)
}

/// Decrypt a buffer produced by [`encrypt`].
///
/// Fails with `SealError::Integrity` when the buffer is truncated or the tag
/// does not verify.
#[instrument(skip_all, fields(sealed_len = sealed.len()))]
pub fn decrypt(sealed: &[u8], key: &SealKey) -> Result<Vec<u8>> {
    if sealed.len() < MIN_SEALED_LEN {
        return Err(SealError::Integrity(IntegrityFailure::Truncated {
            len: sealed.len(),
        }));
    }

    let opening_key = aead_key(key)?;
    let (iv, body_and_tag) = sealed.split_at(IV_LEN);
    let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| {
        SealError::Integrity(IntegrityFailure::Truncated { len: sealed.len() })
    })?;

    let mut in_out = body_and_tag.to_vec();
    let plaintext_len = opening_key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| SealError::Integrity(IntegrityFailure::AuthenticationFailed))?
        .len();
    in_out.truncate(plaintext_len);

    debug!(plaintext_len, "decryption complete");
    Ok(in_out)
}
