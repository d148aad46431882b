// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for people requesting or registering
// documents.
//
// Messages never repeat secret codes, viewer lists or full digests: a denied
// requester learns which kind of check failed and nothing more.

use crate::error::{IntegrityFailure, SealError};
use crate::types::{DenyReason, PolicyMode};

/// How the person reading the message should react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Storage or anchoring hiccup; trying again may work.
    Transient,
    /// Needs a different credential or different input.
    ActionRequired,
    /// The stored copy is unusable. Retrying will not help.
    Permanent,
}

/// What the CLI prints for a failed command: a headline and a next step.
#[derive(Debug, Clone)]
pub struct HumanError {
    pub message: String,
    pub suggestion: String,
    /// Whether repeating the same request could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(severity: Severity, message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }

    fn fix_input(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::new(Severity::ActionRequired, message, suggestion)
    }

    fn try_later(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::new(Severity::Transient, message, suggestion)
    }
}

const REPORT_IF_REPEATED: &str = "Try again. If this keeps happening, please report it.";

/// Turn a `SealError` into text that is safe to show the requester.
pub fn humanize_error(err: &SealError) -> HumanError {
    match err {
        SealError::NotFound { resource, .. } => HumanError::fix_input(
            format!("No {resource} matches that reference."),
            "Check the proof code you were given and try again.",
        ),
        SealError::MissingCredential => HumanError::fix_input(
            "This document is protected.",
            "Pass your wallet address with --identity or the access code with --code.",
        ),
        SealError::AccessDenied { mode, reason } => humanize_denial(*mode, *reason),
        SealError::Integrity(failure) => {
            let suggestion = match failure {
                IntegrityFailure::DigestMismatch { .. } => {
                    "The stored copy no longer matches what was registered. Contact the document owner."
                }
                IntegrityFailure::AuthenticationFailed | IntegrityFailure::Truncated { .. } => {
                    "The stored copy is damaged and cannot be opened. Contact the document owner."
                }
            };
            HumanError::new(
                Severity::Permanent,
                "This document failed its tamper check.",
                suggestion,
            )
        }
        SealError::Validation(detail) => HumanError::fix_input(
            "The request was rejected.",
            format!("Correct the input and run the command again ({detail})."),
        ),
        SealError::Encryption(_) => {
            HumanError::try_later("The document could not be sealed.", REPORT_IF_REPEATED)
        }
        SealError::Storage(_) => HumanError::try_later(
            "Document storage is not responding.",
            "Try again in a few minutes.",
        ),
        SealError::Anchor(_) => HumanError::try_later(
            "The proof could not be anchored right now.",
            "Try again in a few minutes. Your document was not registered.",
        ),
        SealError::Database(_) => HumanError::try_later(
            "The proof registry had a problem.",
            "Try again. Existing proofs are not affected.",
        ),
        SealError::Io(io_err) if io_err.kind() == std::io::ErrorKind::PermissionDenied => {
            HumanError::fix_input(
                "That file cannot be accessed with the current permissions.",
                "Check the file permissions, or copy the file somewhere else first.",
            )
        }
        SealError::Io(_) => HumanError::try_later(
            "A file could not be read or written.",
            "Try again. If this keeps happening, the disk may be full.",
        ),
        SealError::Serialization(_) => {
            HumanError::try_later("Stored data could not be decoded.", REPORT_IF_REPEATED)
        }
    }
}

fn humanize_denial(mode: PolicyMode, reason: DenyReason) -> HumanError {
    let suggestion = match (mode, reason) {
        (_, DenyReason::CodeMismatch) => {
            "The access code is not correct. Codes are case-sensitive; check it and try again."
        }
        (_, DenyReason::CodeRequired) => {
            "This document is opened with an access code. Enter the code you were given."
        }
        (PolicyMode::OwnerOnly, _) => "Only the person who registered this document can open it.",
        (PolicyMode::SpecificWallets, _) => {
            "Your wallet is not on this document's list. Ask the owner to share it with you."
        }
        (PolicyMode::SecretCode, _) => "This document is opened with an access code.",
    };
    HumanError::fix_input("You don't have access to this document.", suggestion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_is_action_required() {
        let err = SealError::AccessDenied {
            mode: PolicyMode::SpecificWallets,
            reason: DenyReason::NotAViewer,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("list"));
    }

    #[test]
    fn tamper_is_permanent_and_hides_digests() {
        let expected = "a".repeat(64);
        let err = SealError::digest_mismatch(expected.clone(), "b".repeat(64));
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert!(!human.message.contains(&expected));
        assert!(!human.suggestion.contains(&expected));
    }

    #[test]
    fn code_mismatch_mentions_case() {
        let err = SealError::AccessDenied {
            mode: PolicyMode::SecretCode,
            reason: DenyReason::CodeMismatch,
        };
        assert!(humanize_error(&err).suggestion.contains("case-sensitive"));
    }

    #[test]
    fn collaborator_outage_is_transient() {
        let human = humanize_error(&SealError::Anchor("rpc timeout".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
        assert!(!human.suggestion.contains("rpc timeout"));
    }
}
