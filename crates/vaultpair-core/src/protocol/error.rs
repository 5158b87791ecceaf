//! Structured engine errors.
//!
//! Engines should report an [`EngineErrorKind`] alongside their message so the
//! client can branch on the kind.  Older engines only send text; for those,
//! [`EngineErrorKind::infer_from_message`] recognises a handful of known
//! phrases.  A structured kind, when present, always wins over inference.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::session::{FailureKind, PairingFailure, PairingState};

/// Machine-readable category of an engine failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// No usable network interface, or the LAN is unreachable.
    NetworkUnavailable,
    /// A port or socket is still held, typically by a session that was not
    /// fully torn down.
    ResourceBusy,
    /// The peers derived different codes, or a side rejected the code.
    CodeMismatch,
    /// The engine gave up waiting on the peer.
    Timeout,
    /// The session was cancelled on the engine side or by the peer.
    Cancelled,
    /// The peer refused the request.
    Rejected,
    /// The engine failed internally.
    Internal,
    /// The engine did not say.
    #[serde(other)]
    Unknown,
}

impl EngineErrorKind {
    /// Best-effort classification of an unstructured engine message.
    ///
    /// Only for engines that do not supply a kind.  Returns
    /// [`EngineErrorKind::Unknown`] when nothing matches.
    pub fn infer_from_message(message: &str) -> EngineErrorKind {
        let lower = message.to_ascii_lowercase();
        let kind = if lower.contains("already in use") || lower.contains("addrinuse") {
            EngineErrorKind::ResourceBusy
        } else if lower.contains("network is unreachable")
            || lower.contains("network unavailable")
            || lower.contains("no network")
        {
            EngineErrorKind::NetworkUnavailable
        } else if lower.contains("mismatch") {
            EngineErrorKind::CodeMismatch
        } else if lower.contains("timed out") || lower.contains("timeout") {
            EngineErrorKind::Timeout
        } else if lower.contains("cancel") {
            EngineErrorKind::Cancelled
        } else if lower.contains("rejected") || lower.contains("declined") {
            EngineErrorKind::Rejected
        } else {
            EngineErrorKind::Unknown
        };
        debug!(?kind, "classified unstructured engine error");
        kind
    }
}

/// An error returned by an engine command.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wraps an unstructured message, inferring its kind.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = EngineErrorKind::infer_from_message(&message);
        Self { kind, message }
    }

    /// Converts the error into a displayable failure for a session that was in
    /// `during` when it happened.
    ///
    /// Kinds that mean the same thing in every phase map directly; the rest are
    /// attributed to the phase the session was in.
    pub fn into_failure(self, during: &PairingState) -> PairingFailure {
        let kind = match self.kind {
            EngineErrorKind::ResourceBusy => FailureKind::ResourceBusy,
            EngineErrorKind::CodeMismatch => FailureKind::Verification,
            EngineErrorKind::Timeout => FailureKind::Timeout,
            EngineErrorKind::Cancelled => FailureKind::PeerCancelled,
            _ => match during {
                PairingState::Idle | PairingState::Listening | PairingState::Discovering => {
                    FailureKind::Discovery
                }
                PairingState::Connecting => FailureKind::Connection,
                PairingState::Verifying => FailureKind::Verification,
                PairingState::Transferring | PairingState::Success => FailureKind::Transfer,
                PairingState::Error(existing) => existing.kind,
            },
        };
        let message = match kind {
            FailureKind::ResourceBusy => format!(
                "A previous pairing session is still holding the network; try again in a moment ({})",
                self.message
            ),
            FailureKind::Discovery => format!("Could not search the local network: {}", self.message),
            FailureKind::Connection => format!("Could not connect to the device: {}", self.message),
            FailureKind::Verification => format!("Verification failed: {}", self.message),
            FailureKind::Transfer => format!("Transfer failed: {}", self.message),
            FailureKind::Timeout => format!("The other device stopped responding: {}", self.message),
            FailureKind::PeerCancelled => format!("Pairing was cancelled: {}", self.message),
            FailureKind::Import => format!("Could not import the vault: {}", self.message),
        };
        PairingFailure::new(kind, message)
    }
}
