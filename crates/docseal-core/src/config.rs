// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SealError};

/// Bounds for generated secret code length, in hex characters.
const MIN_CODE_LEN: usize = 8;
const MAX_CODE_LEN: usize = 64;

/// Persistent service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    /// Record seal/unseal/deny/tamper events in the audit trail.
    pub audit_enabled: bool,
    /// Hex characters in a generated secret access code.
    pub generated_code_len: usize,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// SQLite file holding seal objects, proof records and drafts.
    pub database_file: String,
    /// SQLite file holding the audit trail.
    pub audit_file: String,
    /// Directory (under the data dir) for the on-disk blob store.
    pub blob_dir: String,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            audit_enabled: true,
            generated_code_len: 16,
            log_filter: "info".into(),
            database_file: "docseal.db".into(),
            audit_file: "audit.db".into(),
            blob_dir: "blobs".into(),
        }
    }
}

impl SealConfig {
    /// Reject settings the services cannot honour.
    pub fn validate(&self) -> Result<()> {
        let len = self.generated_code_len;
        if len % 2 != 0 || !(MIN_CODE_LEN..=MAX_CODE_LEN).contains(&len) {
            return Err(SealError::validation(format!(
                "generated_code_len must be even and between {MIN_CODE_LEN} and {MAX_CODE_LEN}, got {len}"
            )));
        }
        for (name, value) in [
            ("database_file", &self.database_file),
            ("audit_file", &self.audit_file),
            ("blob_dir", &self.blob_dir),
        ] {
            if value.trim().is_empty() {
                return Err(SealError::validation(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SealConfig::default();
        assert_eq!(config.generated_code_len, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn odd_or_out_of_range_code_length_rejected() {
        for len in [7, 15, 4, 128] {
            let config = SealConfig {
                generated_code_len: len,
                ..SealConfig::default()
            };
            assert!(config.validate().is_err(), "length {len} should be rejected");
        }
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: SealConfig = serde_json::from_str(r#"{"audit_enabled": false}"#).unwrap();
        assert!(!config.audit_enabled);
        assert_eq!(config.database_file, "docseal.db");
    }
}
