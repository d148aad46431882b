// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Subcommand arguments and handlers.
//
// Handlers write results to stdout and return the process exit code;
// errors bubble up to `main` which renders them for humans.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use docseal_core::error::{Result, SealError};
use docseal_core::types::{AccessRequest, Credential, ProofCode, ProofRecord, RegistrationRequest};
use docseal_ledger::ProofLifecycle;
use tracing::info;

/// Exit code when a presented document does not match its record.
pub const EXIT_MISMATCH: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AccessMode {
    /// Only the owner may unseal.
    OwnerOnly,
    /// The owner and every `--viewer`.
    SpecificWallets,
    /// Anyone holding the secret code.
    SecretCode,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Document to seal and register.
    pub file: PathBuf,

    /// Identity registering the document.
    #[arg(long)]
    pub owner: String,

    #[arg(long, value_enum, default_value_t = AccessMode::OwnerOnly)]
    pub access: AccessMode,

    /// Allowed viewer (repeatable); specific-wallets only.
    #[arg(long = "viewer")]
    pub viewers: Vec<String>,

    /// Secret code to use instead of a generated one; secret-code only.
    #[arg(long)]
    pub code: Option<String>,

    /// Name recorded with the blob. Defaults to the file name.
    #[arg(long)]
    pub name: Option<String>,
}

/// Credentials shared by commands that unseal.
#[derive(Args, Debug)]
pub struct CredentialArgs {
    /// Requester identity.
    #[arg(long)]
    pub identity: Option<String>,

    /// Secret access code.
    #[arg(long)]
    pub code: Option<String>,
}

impl CredentialArgs {
    fn to_credential(&self) -> Credential {
        Credential {
            identity: self.identity.clone(),
            secret_code: self.code.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct RetrieveArgs {
    pub proof_code: String,

    #[command(flatten)]
    pub credential: CredentialArgs,

    /// Write the document here instead of stdout.
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    pub proof_code: String,

    /// Copy of the document to check.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Owner whose records to list.
    #[arg(long)]
    pub owner: String,
}

#[derive(Args, Debug)]
pub struct ConfirmAnchorArgs {
    pub proof_code: String,

    /// Confirmed anchor transaction id.
    pub tx_id: String,
}

#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Only entries for this proof code.
    #[arg(long)]
    pub subject: Option<String>,

    /// Most recent entries to show.
    #[arg(long, default_value_t = 50)]
    pub limit: u32,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub fn run_register(lifecycle: &ProofLifecycle, args: &RegisterArgs, out: &mut impl Write) -> Result<u8> {
    let document = std::fs::read(&args.file)?;
    let document_name = match &args.name {
        Some(name) => name.clone(),
        None => file_name(&args.file),
    };
    let receipt = lifecycle.register(RegistrationRequest {
        document,
        document_name,
        owner: args.owner.clone(),
        access: access_request(args)?,
    })?;

    print_record(out, &receipt.record)?;
    if let Some(code) = &receipt.generated_code {
        writeln!(out, "secret code:     {} (shown once, store it now)", code.expose())?;
    }
    Ok(0)
}

pub fn run_retrieve(lifecycle: &ProofLifecycle, args: &RetrieveArgs, out: &mut impl Write) -> Result<u8> {
    let proof_code = ProofCode::new(args.proof_code.as_str());
    let document = lifecycle.retrieve(&proof_code, &args.credential.to_credential())?;

    match &args.out {
        Some(path) => {
            std::fs::write(path, &document.bytes)?;
            info!(
                path = %path.display(),
                media_type = document.media_type(),
                "document written"
            );
        }
        None => out.write_all(&document.bytes)?,
    }
    Ok(0)
}

pub fn run_verify(lifecycle: &ProofLifecycle, args: &VerifyArgs, out: &mut impl Write) -> Result<u8> {
    let document = std::fs::read(&args.file)?;
    let report = lifecycle.verify_document(&ProofCode::new(args.proof_code.as_str()), &document)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    Ok(if report.matches { 0 } else { EXIT_MISMATCH })
}

pub fn run_list(lifecycle: &ProofLifecycle, args: &ListArgs, out: &mut impl Write) -> Result<u8> {
    for record in lifecycle.records_for_owner(&args.owner)? {
        writeln!(
            out,
            "{}\t{}\t{}",
            record.proof_code,
            record.created_at.to_rfc3339(),
            record.anchor_tx_id
        )?;
    }
    Ok(0)
}

pub fn run_confirm_anchor(
    lifecycle: &ProofLifecycle,
    args: &ConfirmAnchorArgs,
    out: &mut impl Write,
) -> Result<u8> {
    let record = lifecycle.confirm_anchor(&ProofCode::new(args.proof_code.as_str()), &args.tx_id)?;
    print_record(out, &record)?;
    Ok(0)
}

pub fn run_audit(lifecycle: &ProofLifecycle, args: &AuditArgs, out: &mut impl Write) -> Result<u8> {
    let entries = match &args.subject {
        Some(subject) => lifecycle.audit_entries_for(subject)?,
        None => lifecycle.recent_audit_entries(args.limit)?,
    };
    for entry in entries {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            entry.timestamp.to_rfc3339(),
            entry.action,
            entry.subject,
            if entry.success { "ok" } else { "FAILED" },
            entry.details.unwrap_or_default()
        )?;
    }
    Ok(0)
}

pub fn run_drafts(lifecycle: &ProofLifecycle, out: &mut impl Write) -> Result<u8> {
    for draft in lifecycle.incomplete_registrations()? {
        writeln!(out, "{}", serde_json::to_string(&draft)?)?;
    }
    Ok(0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn access_request(args: &RegisterArgs) -> Result<AccessRequest> {
    match args.access {
        AccessMode::OwnerOnly | AccessMode::SecretCode if !args.viewers.is_empty() => Err(
            SealError::validation("--viewer only applies to specific-wallets access"),
        ),
        AccessMode::OwnerOnly | AccessMode::SpecificWallets if args.code.is_some() => Err(
            SealError::validation("--code only applies to secret-code access"),
        ),
        AccessMode::OwnerOnly => Ok(AccessRequest::OwnerOnly),
        AccessMode::SpecificWallets => Ok(AccessRequest::SpecificWallets {
            allowed_viewers: args.viewers.clone(),
        }),
        AccessMode::SecretCode => Ok(AccessRequest::SecretCode {
            code: args.code.clone(),
        }),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into())
}

fn print_record(out: &mut impl Write, record: &ProofRecord) -> Result<()> {
    writeln!(out, "proof code:      {}", record.proof_code)?;
    writeln!(out, "owner:           {}", record.owner_address)?;
    writeln!(out, "plaintext hash:  {}", record.plaintext_hash)?;
    writeln!(out, "content id:      {}", record.content_id)?;
    writeln!(out, "anchor tx:       {}", record.anchor_tx_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docseal_core::SealConfig;
    use docseal_ledger::{LocalAnchor, MemoryBlobStore};

    fn lifecycle() -> ProofLifecycle {
        ProofLifecycle::in_memory(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(LocalAnchor::new()),
            SealConfig::default(),
        )
        .unwrap()
    }

    fn register_args(file: PathBuf, access: AccessMode) -> RegisterArgs {
        RegisterArgs {
            file,
            owner: "0xabc".into(),
            access,
            viewers: vec![],
            code: None,
            name: None,
        }
    }

    fn proof_code_from(output: &[u8]) -> String {
        let text = String::from_utf8_lossy(output);
        text.lines()
            .find_map(|l| l.strip_prefix("proof code:"))
            .map(|c| c.trim().to_string())
            .expect("proof code printed")
    }

    #[test]
    fn register_then_retrieve_to_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, b"keep this safe").unwrap();
        let lc = lifecycle();

        let mut out = Vec::new();
        assert_eq!(
            run_register(&lc, &register_args(file, AccessMode::OwnerOnly), &mut out).unwrap(),
            0
        );
        let proof_code = proof_code_from(&out);

        let mut doc = Vec::new();
        run_retrieve(
            &lc,
            &RetrieveArgs {
                proof_code,
                credential: CredentialArgs {
                    identity: Some("0xabc".into()),
                    code: None,
                },
                out: None,
            },
            &mut doc,
        )
        .unwrap();
        assert_eq!(doc, b"keep this safe");
    }

    #[test]
    fn generated_code_is_printed_once() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.txt");
        std::fs::write(&file, b"for code holders").unwrap();
        let lc = lifecycle();

        let mut out = Vec::new();
        run_register(&lc, &register_args(file, AccessMode::SecretCode), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("secret code:"));
    }

    #[test]
    fn verify_exit_code_reflects_match() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("a.txt");
        let forged = dir.path().join("b.txt");
        std::fs::write(&original, b"original").unwrap();
        std::fs::write(&forged, b"forged").unwrap();
        let lc = lifecycle();

        let mut out = Vec::new();
        run_register(&lc, &register_args(original.clone(), AccessMode::OwnerOnly), &mut out).unwrap();
        let proof_code = proof_code_from(&out);

        let verify = |file: PathBuf| {
            run_verify(
                &lc,
                &VerifyArgs {
                    proof_code: proof_code.clone(),
                    file,
                },
                &mut Vec::new(),
            )
            .unwrap()
        };
        assert_eq!(verify(original), 0);
        assert_eq!(verify(forged), EXIT_MISMATCH);
    }

    #[test]
    fn mismatched_flags_rejected() {
        let mut args = register_args(PathBuf::from("x"), AccessMode::OwnerOnly);
        args.viewers = vec!["0x111".into()];
        assert!(matches!(access_request(&args), Err(SealError::Validation(_))));

        let mut args = register_args(PathBuf::from("x"), AccessMode::SpecificWallets);
        args.code = Some("abc".into());
        assert!(matches!(access_request(&args), Err(SealError::Validation(_))));
    }
}
