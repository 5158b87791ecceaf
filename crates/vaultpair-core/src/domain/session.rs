//! Pairing session identity, roles, and states.
//!
//! # Session lifecycle
//!
//! ```text
//!            Receiver                         Sender
//!            ────────                         ──────
//! Idle ──► Listening                Idle ──► Discovering
//!              │ peer connects                   │ peer selected
//!              ▼                                 ▼
//!          Connecting  ◄─────────────────►  Connecting
//!              │ engine issues code              │
//!              ▼                                 ▼
//!          Verifying   (both confirm)       Verifying
//!              ▼                                 ▼
//!          Transferring                     Transferring
//!              ▼                                 ▼
//!           Success                          Success
//! ```
//!
//! Any active state can fall into `Error(..)`.  `Error` only leaves through an
//! explicit user retry (new session) or reset (back to `Idle`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::peer::DiscoveredPeer;
use crate::domain::verification::VerificationCode;

/// Identity of one pairing attempt.
///
/// Minted by the client for every attempt, retries included, and passed on
/// every engine call concerning that attempt.  Poll results are correlated by
/// this id so a response for an abandoned attempt can never touch a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mints a fresh random session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Which end of the pairing this device plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingRole {
    /// Holds the vault and pushes its credentials.
    Sender,
    /// Opens "Pair Device", waits to be found, imports the credentials.
    Receiver,
}

impl fmt::Display for PairingRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingRole::Sender => f.write_str("sender"),
            PairingRole::Receiver => f.write_str("receiver"),
        }
    }
}

/// Category of a pairing failure.
///
/// The UI branches on this to choose its guidance.  `Import` in particular is
/// not a protocol failure: the transfer worked but the payload was rejected
/// locally, so repeating the pairing would not help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Advertising or scanning could not start or broke down.
    Discovery,
    /// The connection or key exchange with the selected peer failed.
    Connection,
    /// The code was never confirmed, or the engine saw a mismatch.
    Verification,
    /// The verified channel failed before the payload arrived intact.
    Transfer,
    /// The payload arrived but the local vault import rejected it.
    Import,
    /// A resource such as the discovery port is still held by an earlier session.
    ResourceBusy,
    /// A phase did not finish within its deadline.
    Timeout,
    /// The remote device abandoned the session.
    PeerCancelled,
}

impl FailureKind {
    /// Whether repeating the whole pairing flow is a sensible remedy.
    pub fn is_retryable(self) -> bool {
        !matches!(self, FailureKind::Import)
    }
}

/// A terminal failure with a message suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl PairingFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for PairingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The pairing state machine's states.  Exactly one is current at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    /// No session.
    Idle,
    /// Receiver only: advertising readiness, waiting to be found.
    Listening,
    /// Sender only: scanning for peers, waiting for the user to pick one.
    Discovering,
    /// Key exchange with the chosen peer is in progress.
    Connecting,
    /// Both devices show the same code; waiting for confirmation.
    Verifying,
    /// Both confirmations registered; payload in flight.
    Transferring,
    /// Payload delivered (and, on the receiver, imported).
    Success,
    /// The session failed.
    Error(PairingFailure),
}

impl PairingState {
    /// Short lowercase name used in logs and DTOs.
    pub fn name(&self) -> &'static str {
        match self {
            PairingState::Idle => "idle",
            PairingState::Listening => "listening",
            PairingState::Discovering => "discovering",
            PairingState::Connecting => "connecting",
            PairingState::Verifying => "verifying",
            PairingState::Transferring => "transferring",
            PairingState::Success => "success",
            PairingState::Error(_) => "error",
        }
    }

    /// States in which the engine holds resources on behalf of the session.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PairingState::Listening
                | PairingState::Discovering
                | PairingState::Connecting
                | PairingState::Verifying
                | PairingState::Transferring
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PairingState::Success | PairingState::Error(_))
    }

    /// States during which the controller polls the engine's session status.
    pub fn polls_status(&self) -> bool {
        matches!(
            self,
            PairingState::Listening
                | PairingState::Connecting
                | PairingState::Verifying
                | PairingState::Transferring
        )
    }

    /// States during which the controller polls the discovered peer list.
    pub fn polls_peers(&self) -> bool {
        matches!(self, PairingState::Discovering)
    }

    pub fn failure(&self) -> Option<&PairingFailure> {
        match self {
            PairingState::Error(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for PairingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingState::Error(failure) => write!(f, "error: {failure}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Read-only snapshot of the current pairing session.
///
/// The controller replaces the whole snapshot on every change; observers never
/// see a half-updated value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairingSession {
    pub session_id: Option<SessionId>,
    pub role: Option<PairingRole>,
    pub state: PairingState,
    pub verification_code: Option<VerificationCode>,
    pub peer_name: Option<String>,
    pub error: Option<String>,
    pub discovered_peers: Vec<DiscoveredPeer>,
}

impl PairingSession {
    /// The snapshot shown when no session exists.
    pub fn idle() -> Self {
        Self {
            session_id: None,
            role: None,
            state: PairingState::Idle,
            verification_code: None,
            peer_name: None,
            error: None,
            discovered_peers: Vec::new(),
        }
    }

    /// Kind of the current failure, if the session is in `Error`.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.state.failure().map(|f| f.kind)
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::idle()
    }
}
