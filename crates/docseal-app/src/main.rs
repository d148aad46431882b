// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Docseal: sealed, access-controlled and anchored document proofs.
//
// Entry point. Resolves the data directory, loads settings, initialises
// logging and services, then dispatches the subcommand.

mod commands;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docseal_core::human_errors::humanize_error;
use tracing_subscriber::EnvFilter;

use commands::{
    AuditArgs, ConfirmAnchorArgs, ListArgs, RegisterArgs, RetrieveArgs, VerifyArgs,
};
use services::app_services::{AppServices, load_config};
use services::data_dir;

/// Seal documents under an access policy, anchor their fingerprints and hand
/// them back only to authorised requesters.
#[derive(Parser, Debug)]
#[command(name = "docseal", version, about, long_about = None)]
struct Cli {
    /// Data directory (overrides $DOCSEAL_DATA_DIR).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal, store and anchor a document.
    Register(RegisterArgs),
    /// Verify and decrypt a registered document.
    Retrieve(RetrieveArgs),
    /// Check a copy of a document against its proof record.
    Verify(VerifyArgs),
    /// List the records registered by an owner.
    List(ListArgs),
    /// Replace a record's provisional anchor transaction id.
    ConfirmAnchor(ConfirmAnchorArgs),
    /// Show the audit trail.
    Audit(AuditArgs),
    /// Show registrations that did not complete.
    Drafts,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let dir = match &cli.data_dir {
        Some(dir) => data_dir::ensure(dir).map(|()| dir.clone()),
        None => data_dir::data_dir(),
    };
    let config = dir.and_then(|dir| load_config(&dir).map(|config| (dir, config)));
    let (dir, config) = match config {
        Ok(loaded) => loaded,
        Err(e) => return report(&e),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(path = %dir.display(), "docseal starting");

    let services = match AppServices::init(&dir, config) {
        Ok(services) => services,
        Err(e) => return report(&e),
    };
    let lifecycle = services.lifecycle();
    let mut stdout = std::io::stdout().lock();

    let result = match &cli.command {
        Commands::Register(args) => commands::run_register(lifecycle, args, &mut stdout),
        Commands::Retrieve(args) => commands::run_retrieve(lifecycle, args, &mut stdout),
        Commands::Verify(args) => commands::run_verify(lifecycle, args, &mut stdout),
        Commands::List(args) => commands::run_list(lifecycle, args, &mut stdout),
        Commands::ConfirmAnchor(args) => commands::run_confirm_anchor(lifecycle, args, &mut stdout),
        Commands::Audit(args) => commands::run_audit(lifecycle, args, &mut stdout),
        Commands::Drafts => commands::run_drafts(lifecycle, &mut stdout),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => report(&e),
    }
}

/// Print a human-readable error and return the failure exit code.
fn report(err: &docseal_core::SealError) -> ExitCode {
    tracing::error!(kind = %err.kind(), "{err}");
    let human = humanize_error(err);
    eprintln!("{}\n{}", human.message, human.suggestion);
    ExitCode::FAILURE
}
