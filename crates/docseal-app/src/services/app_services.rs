// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens every on-disk store under the data directory
// and wires them into one `ProofLifecycle`.
//
// Seal objects, proof records and registration drafts share one SQLite file;
// the audit trail has its own.  Sealed blobs live one file per content id
// under the blob directory.

use std::path::Path;
use std::sync::Arc;

use docseal_core::SealConfig;
use docseal_core::error::Result;
use docseal_ledger::{FsBlobStore, LocalAnchor, ProofLifecycle};
use docseal_security::AuditLog;
use tracing::{info, warn};

/// File name of the persisted settings inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Everything a CLI command needs.
pub struct AppServices {
    lifecycle: ProofLifecycle,
}

impl AppServices {
    /// Open all stores under `data_dir` using `config`.
    pub fn init(data_dir: &Path, config: SealConfig) -> Result<Self> {
        config.validate()?;
        info!(path = %data_dir.display(), "initialising services");

        let blobs = FsBlobStore::open(data_dir.join(&config.blob_dir))?;
        let audit_log = if config.audit_enabled {
            Some(AuditLog::open(data_dir.join(&config.audit_file))?)
        } else {
            None
        };

        let mut lifecycle = ProofLifecycle::open(
            data_dir.join(&config.database_file),
            Arc::new(blobs),
            Arc::new(LocalAnchor::new()),
            config,
        )?;
        if let Some(log) = audit_log {
            lifecycle = lifecycle.with_audit(log);
        }

        Ok(Self { lifecycle })
    }

    pub fn lifecycle(&self) -> &ProofLifecycle {
        &self.lifecycle
    }
}

// -- Config persistence -------------------------------------------------------

/// Load `config.json` from `data_dir`.
///
/// A missing file yields (and writes out) the defaults; an unreadable one is
/// reported and replaced by defaults for this run only.
pub fn load_config(data_dir: &Path) -> Result<SealConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let config = SealConfig::default();
            persist_config(data_dir, &config)?;
            return Ok(config);
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_str(&data) {
        Ok(config) => Ok(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed config, using defaults");
            Ok(SealConfig::default())
        }
    }
}

pub fn persist_config(data_dir: &Path, config: &SealConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docseal_core::types::{AccessRequest, Credential, RegistrationRequest};

    #[test]
    fn missing_config_is_written_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, SealConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = SealConfig {
            generated_code_len: 24,
            audit_enabled: false,
            ..SealConfig::default()
        };
        persist_config(dir.path(), &config).unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), config);
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), SealConfig::default());
    }

    #[test]
    fn services_open_on_disk_and_audit() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(dir.path(), SealConfig::default()).unwrap();
        let lifecycle = services.lifecycle();

        let receipt = lifecycle
            .register(RegistrationRequest {
                document: b"minutes of the 3 March meeting".to_vec(),
                document_name: "minutes.txt".into(),
                owner: "0xabc".into(),
                access: AccessRequest::OwnerOnly,
            })
            .unwrap();
        lifecycle
            .retrieve(&receipt.record.proof_code, &Credential::identity("0xabc"))
            .unwrap();

        assert!(dir.path().join("docseal.db").exists());
        assert!(dir.path().join("audit.db").exists());
        assert_eq!(lifecycle.recent_audit_entries(10).unwrap().len(), 2);
    }
}
