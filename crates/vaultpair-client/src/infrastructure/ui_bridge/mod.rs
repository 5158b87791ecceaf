//! UI command bridge: exposes the pairing and QR export controllers to the
//! frontend.
//!
//! Every command is an `async fn` taking the shared [`AppState`] and returning
//! a [`CommandResult`].  The desktop shell registers these as its IPC
//! commands; the headless binary calls them directly.  The Application and
//! Domain layers must NOT import this module.
//!
//! # Data Transfer Objects (DTOs)
//!
//! Controller snapshots hold domain types (`SessionId`, `PairingState`,
//! `VerificationCode`) that the frontend should not have to understand.  The
//! DTOs below flatten them into strings, digits, and flags:
//!
//! - `state` is the lowercase state name (`"listening"`, `"verifying"`, ...).
//! - `digits` is the verification code as one number per box, empty until the
//!   engine issued one.
//! - `error_kind` is the failure category the UI branches on for guidance
//!   (`"Import"` means "the transfer worked but the vault was rejected").
//!
//! No DTO ever carries the transferred vault secret.
//!
//! # `CommandResult<T>` wrapper
//!
//! All commands return `CommandResult<T>` rather than `Result<T, E>`, so
//! every response has the same shape:
//! `{ success: bool, data: T | null, error: string | null }`.
//! A refused action (confirming twice, selecting an unknown peer) comes back
//! as `success: false`.  Engine failures do not: they show up in the next
//! status as `state: "error"`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use vaultpair_core::{DiscoveredPeer, PairingSession};

use crate::application::pairing_session::PairingController;
use crate::application::ports::{
    Authenticator, FrameRenderer, PairingEngine, QrExportEngine, VaultImporter,
};
use crate::application::qr_export::{QrExportController, QrExportSnapshot, QrExportState};
use crate::infrastructure::engine::{
    InMemoryVaultStore, LoggingFrameRenderer, PresenceAuthenticator, SimulatedEngine,
    SimulatedQrEngine,
};
use crate::infrastructure::storage::config::AppConfig;

// ── Shared application state ──────────────────────────────────────────────────

/// The collaborators the controllers are built from.
#[derive(Clone)]
pub struct Collaborators {
    pub engine: Arc<dyn PairingEngine>,
    pub importer: Arc<dyn VaultImporter>,
    pub qr_engine: Arc<dyn QrExportEngine>,
    pub authenticator: Arc<dyn Authenticator>,
    pub renderer: Arc<dyn FrameRenderer>,
}

impl Collaborators {
    /// In-process stand-ins for every collaborator.
    pub fn simulated() -> Self {
        Self {
            engine: Arc::new(SimulatedEngine::default()),
            importer: Arc::new(InMemoryVaultStore::new()),
            qr_engine: Arc::new(SimulatedQrEngine::default()),
            authenticator: Arc::new(PresenceAuthenticator::new(true)),
            renderer: Arc::new(LoggingFrameRenderer),
        }
    }
}

/// Application state shared between commands.
///
/// The controllers synchronise internally and are cheap to clone, so they are
/// held directly.  Only the config needs an async mutex.
pub struct AppState {
    pub pairing: PairingController,
    pub qr_export: QrExportController,
    /// The configuration the controllers were built from.
    pub config: Mutex<AppConfig>,
}

impl AppState {
    /// Builds both controllers with the timings from `config`.
    pub fn new(config: AppConfig, collaborators: Collaborators) -> Arc<Self> {
        let pairing = PairingController::new(
            collaborators.engine,
            collaborators.importer,
            config.pairing.timings(),
        );
        let qr_export = QrExportController::new(
            collaborators.qr_engine,
            collaborators.authenticator,
            collaborators.renderer,
            config.qr.timings(),
        );
        Arc::new(Self {
            pairing,
            qr_export,
            config: Mutex::new(config),
        })
    }
}

// ── Data Transfer Objects (Presentation layer) ────────────────────────────────

/// DTO for one discovered peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDto {
    pub id: String,
    pub name: String,
    pub address: String,
}

impl From<&DiscoveredPeer> for PeerDto {
    fn from(p: &DiscoveredPeer) -> Self {
        Self {
            id: p.id.clone(),
            name: p.display_name.clone(),
            address: p.network_address.clone(),
        }
    }
}

/// DTO for the pairing dialog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingSessionDto {
    pub session_id: Option<String>,
    pub role: Option<String>,
    pub state: String,
    pub digits: Vec<u8>,
    pub peer_name: Option<String>,
    pub error: Option<String>,
    pub error_kind: Option<String>,
    /// Whether the "Try again" button makes sense.
    pub retryable: bool,
    pub peers: Vec<PeerDto>,
    pub locally_confirmed: bool,
}

impl PairingSessionDto {
    pub fn from_session(session: &PairingSession, locally_confirmed: bool) -> Self {
        let kind = session.failure_kind();
        Self {
            session_id: session.session_id.map(|id| id.to_string()),
            role: session.role.map(|r| r.to_string()),
            state: session.state.name().to_string(),
            digits: session
                .verification_code
                .as_ref()
                .map(|c| c.digits())
                .unwrap_or_default(),
            peer_name: session.peer_name.clone(),
            error: session.error.clone(),
            error_kind: kind.map(|k| format!("{k:?}")),
            retryable: kind.is_some_and(|k| k.is_retryable()),
            peers: session.discovered_peers.iter().map(PeerDto::from).collect(),
            locally_confirmed,
        }
    }
}

/// DTO for the QR export screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrExportDto {
    pub state: String,
    pub failure_reason: Option<String>,
    pub error: Option<String>,
    pub export_id: Option<String>,
    pub frames_played: u64,
    pub current_frame: Option<String>,
}

impl From<&QrExportSnapshot> for QrExportDto {
    fn from(s: &QrExportSnapshot) -> Self {
        let (failure_reason, error) = match &s.state {
            QrExportState::Failed { reason, message } => {
                (Some(format!("{reason:?}")), Some(message.clone()))
            }
            _ => (None, None),
        };
        Self {
            state: s.state.name().to_string(),
            failure_reason,
            error,
            export_id: s.session.as_ref().map(|x| x.export_id.to_string()),
            frames_played: s.session.as_ref().map_or(0, |x| x.frames_played),
            current_frame: s
                .session
                .as_ref()
                .and_then(|x| x.current_frame.as_ref())
                .map(|f| f.data.clone()),
        }
    }
}

/// Unified response wrapper used by commands.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

fn pairing_dto(state: &AppState) -> PairingSessionDto {
    PairingSessionDto::from_session(&state.pairing.snapshot(), state.pairing.is_locally_confirmed())
}

fn qr_dto(state: &AppState) -> QrExportDto {
    QrExportDto::from(&state.qr_export.snapshot())
}

// ── Pairing commands ──────────────────────────────────────────────────────────

/// Opens "Pair Device" on the receiving device.
///
/// # Example (frontend)
/// ```ts
/// const res = await invoke<CommandResult<PairingSessionDto>>('start_pair_device');
/// ```
pub async fn start_pair_device(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    match state.pairing.start_receiver().await {
        Ok(_) => CommandResult::ok(pairing_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// Opens "Share Vault" for `vault_id` on the sending device.
pub async fn start_share_vault(
    state: Arc<AppState>,
    vault_id: String,
) -> CommandResult<PairingSessionDto> {
    if vault_id.trim().is_empty() {
        return CommandResult::err("vault_id must not be empty");
    }
    match state.pairing.start_sender(vault_id).await {
        Ok(_) => CommandResult::ok(pairing_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// Returns the current pairing session.  The UI polls this.
pub async fn get_pairing_status(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    CommandResult::ok(pairing_dto(&state))
}

pub async fn select_peer(
    state: Arc<AppState>,
    peer_id: String,
) -> CommandResult<PairingSessionDto> {
    match state.pairing.select_peer(&peer_id).await {
        Ok(()) => CommandResult::ok(pairing_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// The user pressed "Codes match".
pub async fn confirm_pairing(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    match state.pairing.confirm().await {
        Ok(()) => CommandResult::ok(pairing_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn cancel_pairing(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    state.pairing.cancel();
    CommandResult::ok(pairing_dto(&state))
}

pub async fn retry_pairing(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    match state.pairing.retry().await {
        Ok(_) => CommandResult::ok(pairing_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// The dialog was dismissed, by the close button or by navigating away.
pub async fn close_pairing(state: Arc<AppState>) -> CommandResult<PairingSessionDto> {
    state.pairing.close();
    CommandResult::ok(pairing_dto(&state))
}

// ── QR export commands ────────────────────────────────────────────────────────

pub async fn start_qr_export(state: Arc<AppState>, vault_id: String) -> CommandResult<QrExportDto> {
    match state.qr_export.begin(vault_id) {
        Ok(()) => CommandResult::ok(qr_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// Hands the text of a scanned request code to the export controller.
pub async fn submit_scanned_request(
    state: Arc<AppState>,
    request: String,
) -> CommandResult<QrExportDto> {
    match state.qr_export.on_request_scanned(&request).await {
        Ok(()) => CommandResult::ok(qr_dto(&state)),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn get_qr_export_status(state: Arc<AppState>) -> CommandResult<QrExportDto> {
    CommandResult::ok(qr_dto(&state))
}

pub async fn cancel_qr_export(state: Arc<AppState>) -> CommandResult<QrExportDto> {
    state.qr_export.cancel();
    CommandResult::ok(qr_dto(&state))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
