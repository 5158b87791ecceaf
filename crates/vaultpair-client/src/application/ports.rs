//! Collaborator ports: the traits the application layer drives.
//!
//! Everything outside the client's own state machine sits behind one of these
//! traits.  The native pairing engine (key exchange, LAN transport, storage),
//! the local vault importer, the local authenticator, and the screen that draws
//! QR codes are all injected as `Arc<dyn Trait>` at construction time, so every
//! use case can be unit-tested with recording doubles.
//!
//! # Session identity
//!
//! Every engine call that concerns a pairing session carries the
//! [`SessionId`] the client minted for it.  An engine must never act on the
//! "current" session implicitly; a stale call for an old id is expected to be
//! a no-op on the engine side.

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use vaultpair_core::{
    DiscoveredPeer, EngineError, EngineStatus, ExportId, FramePoll, PairingRole, QrFrame,
    SessionId, VaultTransferPayload,
};

/// Error returned by the local vault import routine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    /// The payload is not a structurally valid vault configuration.
    #[error("received payload is not a valid vault configuration: {0}")]
    InvalidPayload(String),
    /// A vault with the same identity is already configured on this device.
    #[error("vault already exists on this device")]
    AlreadyExists,
    /// Local storage refused the write.
    #[error("failed to store vault: {0}")]
    Storage(String),
}

/// Error returned by the local authenticator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication was cancelled by the user")]
    Cancelled,
    #[error("authentication failed: {0}")]
    Failed(String),
    #[error("no authentication method is available on this device")]
    Unavailable,
}

/// Command surface of the native pairing engine.
#[async_trait]
pub trait PairingEngine: Send + Sync {
    /// Begins advertising this device as pairing-ready and scanning for peers.
    async fn start_discovery(&self, session: SessionId) -> Result<(), EngineError>;

    /// Stops advertising and scanning.
    async fn stop_discovery(&self, session: SessionId) -> Result<(), EngineError>;

    /// Returns the peers seen so far.  May contain duplicates.
    async fn list_peers(&self, session: SessionId) -> Result<Vec<DiscoveredPeer>, EngineError>;

    /// Sender only: starts the key exchange with `peer_id` for `vault_id`.
    async fn initiate_pairing(
        &self,
        session: SessionId,
        peer_id: &str,
        vault_id: &str,
    ) -> Result<(), EngineError>;

    /// Returns the engine's view of the session.
    async fn pairing_status(&self, session: SessionId) -> Result<EngineStatus, EngineError>;

    /// Registers this device's confirmation of the verification code.
    async fn confirm_pairing(&self, session: SessionId, role: PairingRole)
        -> Result<(), EngineError>;

    /// Tears the session down on the engine side.  Safe to call more than once.
    async fn cancel_pairing(&self, session: SessionId) -> Result<(), EngineError>;

    /// Receiver only: the transferred payload, or `None` while it is not ready.
    async fn received_payload(
        &self,
        session: SessionId,
    ) -> Result<Option<VaultTransferPayload>, EngineError>;
}

/// Applies a received vault payload to local storage.
#[async_trait]
pub trait VaultImporter: Send + Sync {
    /// Imports `payload`.  Either the whole vault is configured or nothing is.
    async fn import_vault(&self, payload: VaultTransferPayload) -> Result<(), ImportError>;
}

/// Local user authentication (biometric or device credential).
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Prompts the user, showing `reason`.  Resolves once the user is verified.
    async fn authenticate(&self, reason: &str) -> Result<(), AuthError>;
}

/// Engine side of the animated-QR export transport.
#[async_trait]
pub trait QrExportEngine: Send + Sync {
    /// Starts an export of `vault_id` for the peer that produced `request`.
    ///
    /// Requires an [`AuthGrant`], which only the export controller can mint
    /// after local authentication succeeded.
    async fn start_export(
        &self,
        grant: &AuthGrant,
        vault_id: &str,
        request: &str,
    ) -> Result<ExportId, EngineError>;

    /// Returns the next frame to display, or completion.
    async fn next_frame(&self, export: &ExportId) -> Result<FramePoll, EngineError>;

    /// Invalidates the export so a half-sent secret cannot be redeemed.
    async fn cancel_export(&self, export: &ExportId) -> Result<(), EngineError>;
}

/// Draws one QR frame on screen.
#[cfg_attr(test, mockall::automock)]
pub trait FrameRenderer: Send + Sync {
    fn render_frame(&self, frame: &QrFrame);
}

/// Proof that the local user authenticated for an export.
///
/// Cannot be constructed outside this crate.
#[derive(Debug)]
pub struct AuthGrant {
    granted_at: Instant,
}

impl AuthGrant {
    pub(crate) fn new() -> Self {
        Self {
            granted_at: Instant::now(),
        }
    }

    /// When the user authenticated.
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }
}
