// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// SHA-256 fingerprints of plaintext and sealed bytes.

use docseal_core::error::{Result, SealError};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Lowercase hex SHA-256 of `data`.
///
/// Taken over the plaintext at registration and over the ciphertext as it is
/// handed to the blob store.
pub fn hash_bytes(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Check `data` against a stored digest.
///
/// `expected_hex` may be in either case. The comparison runs in constant time
/// over equal-length digests; any difference yields `DigestMismatch` carrying
/// both values.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> Result<()> {
    let actual = hash_bytes(data);
    let expected = expected_hex.to_ascii_lowercase();

    let matches = actual.len() == expected.len()
        && bool::from(actual.as_bytes().ct_eq(expected.as_bytes()));
    if !matches {
        return Err(SealError::digest_mismatch(expected_hex, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::error::IntegrityFailure;

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let digest = hash_bytes(b"Deed of sale, lot 14");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(digest, hash_bytes(b"Deed of sale, lot 14"));
    }

    #[test]
    fn digest_of_abc_matches_fips_vector() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn uppercase_stored_digest_still_verifies() {
        let contract = b"clause 4.2: the lessee shall";
        let stored = hash_bytes(contract).to_ascii_uppercase();
        verify_hash(contract, &stored).unwrap();
    }

    #[test]
    fn truncated_digest_is_a_mismatch() {
        let data = b"invoice #2231";
        let short = &hash_bytes(data)[..32];
        match verify_hash(data, short).unwrap_err() {
            SealError::Integrity(IntegrityFailure::DigestMismatch { expected, actual }) => {
                assert_eq!(expected, short);
                assert_eq!(actual, hash_bytes(data));
            }
            other => panic!("expected a digest mismatch, got {other}"),
        }
    }

    #[test]
    fn single_flipped_byte_is_detected() {
        let mut sealed = b"\x01\x02\x03 ciphertext body".to_vec();
        let stored = hash_bytes(&sealed);
        sealed[5] ^= 0x01;
        assert!(verify_hash(&sealed, &stored).is_err());
    }
}
