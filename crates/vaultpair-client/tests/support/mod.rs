//! Recording collaborator doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vaultpair_client::application::pairing_session::{PairingController, PairingTimings};
use vaultpair_client::application::ports::{
    AuthError, AuthGrant, Authenticator, FrameRenderer, ImportError, PairingEngine,
    QrExportEngine, VaultImporter,
};
use vaultpair_core::{
    DiscoveredPeer, EngineError, EngineState, EngineStatus, ExportId, FramePoll, PairingRole,
    QrFrame, SessionId, VaultTransferPayload,
};

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    StartDiscovery(SessionId),
    StopDiscovery(SessionId),
    ListPeers(SessionId),
    Initiate {
        session: SessionId,
        peer_id: String,
        vault_id: String,
    },
    Status(SessionId),
    Confirm(SessionId, PairingRole),
    Cancel(SessionId),
    Payload(SessionId),
}

/// A pairing engine whose answers the test sets directly.
pub struct ScriptedEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub status: Mutex<EngineStatus>,
    pub peers: Mutex<Vec<DiscoveredPeer>>,
    pub payload: Mutex<Option<String>>,
    /// Errors returned by successive `start_discovery` calls before it
    /// succeeds.
    pub discovery_failures: Mutex<VecDeque<EngineError>>,
    /// Artificial latency of `pairing_status`.
    pub status_delay: Mutex<Duration>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            status: Mutex::new(EngineStatus::with_state(EngineState::Listening)),
            peers: Mutex::new(Vec::new()),
            payload: Mutex::new(None),
            discovery_failures: Mutex::new(VecDeque::new()),
            status_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub fn set_status(&self, status: EngineStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn set_state(&self, state: EngineState) {
        self.set_status(EngineStatus::with_state(state));
    }

    pub fn set_code(&self, code: &str) {
        let mut status = EngineStatus::with_state(EngineState::Verifying);
        status.verification_code = Some(code.to_string());
        self.set_status(status);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub fn status_polls(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Status(_)))
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl PairingEngine for ScriptedEngine {
    async fn start_discovery(&self, session: SessionId) -> Result<(), EngineError> {
        self.record(EngineCall::StartDiscovery(session));
        match self.discovery_failures.lock().unwrap().pop_front() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn stop_discovery(&self, session: SessionId) -> Result<(), EngineError> {
        self.record(EngineCall::StopDiscovery(session));
        Ok(())
    }

    async fn list_peers(&self, session: SessionId) -> Result<Vec<DiscoveredPeer>, EngineError> {
        self.record(EngineCall::ListPeers(session));
        Ok(self.peers.lock().unwrap().clone())
    }

    async fn initiate_pairing(
        &self,
        session: SessionId,
        peer_id: &str,
        vault_id: &str,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Initiate {
            session,
            peer_id: peer_id.to_string(),
            vault_id: vault_id.to_string(),
        });
        Ok(())
    }

    async fn pairing_status(&self, session: SessionId) -> Result<EngineStatus, EngineError> {
        self.record(EngineCall::Status(session));
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.status.lock().unwrap().clone())
    }

    async fn confirm_pairing(
        &self,
        session: SessionId,
        role: PairingRole,
    ) -> Result<(), EngineError> {
        self.record(EngineCall::Confirm(session, role));
        Ok(())
    }

    async fn cancel_pairing(&self, session: SessionId) -> Result<(), EngineError> {
        self.record(EngineCall::Cancel(session));
        Ok(())
    }

    async fn received_payload(
        &self,
        session: SessionId,
    ) -> Result<Option<VaultTransferPayload>, EngineError> {
        self.record(EngineCall::Payload(session));
        Ok(self
            .payload
            .lock()
            .unwrap()
            .clone()
            .map(VaultTransferPayload::new))
    }
}

/// Records every imported blob; fails with `failure` when set.
#[derive(Default)]
pub struct RecordingImporter {
    pub imported: Mutex<Vec<String>>,
    pub failure: Mutex<Option<ImportError>>,
}

#[async_trait]
impl VaultImporter for RecordingImporter {
    async fn import_vault(&self, payload: VaultTransferPayload) -> Result<(), ImportError> {
        self.imported
            .lock()
            .unwrap()
            .push(payload.expose().to_string());
        match self.failure.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

pub fn peer(id: &str, name: &str) -> DiscoveredPeer {
    DiscoveredPeer {
        id: id.to_string(),
        display_name: name.to_string(),
        network_address: "192.168.1.20:47000".to_string(),
    }
}

pub fn controller(
    engine: &Arc<ScriptedEngine>,
    importer: &Arc<RecordingImporter>,
) -> PairingController {
    PairingController::new(
        Arc::clone(engine) as Arc<dyn PairingEngine>,
        Arc::clone(importer) as Arc<dyn VaultImporter>,
        PairingTimings::default(),
    )
}

/// Lets spawned pollers and release tasks run.
pub async fn settle(duration: Duration) {
    tokio::time::sleep(duration).await;
}

// ── QR export doubles ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingQrEngine {
    pub starts: Mutex<Vec<(String, String)>>,
    pub frames: Mutex<VecDeque<Result<FramePoll, EngineError>>>,
    pub frame_fetches: Mutex<usize>,
    pub cancels: Mutex<Vec<ExportId>>,
    /// Latency of `start_export`.
    pub start_delay: Mutex<Duration>,
}

impl RecordingQrEngine {
    pub fn fetches(&self) -> usize {
        *self.frame_fetches.lock().unwrap()
    }
}

#[async_trait]
impl QrExportEngine for RecordingQrEngine {
    async fn start_export(
        &self,
        _grant: &AuthGrant,
        vault_id: &str,
        request: &str,
    ) -> Result<ExportId, EngineError> {
        self.starts
            .lock()
            .unwrap()
            .push((vault_id.to_string(), request.to_string()));
        let delay = *self.start_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(ExportId::new("export-1"))
    }

    async fn next_frame(&self, _export: &ExportId) -> Result<FramePoll, EngineError> {
        *self.frame_fetches.lock().unwrap() += 1;
        self.frames
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FramePoll::Frame("ur:part/loop".to_string())))
    }

    async fn cancel_export(&self, export: &ExportId) -> Result<(), EngineError> {
        self.cancels.lock().unwrap().push(export.clone());
        Ok(())
    }
}

pub struct ScriptedAuthenticator {
    pub result: Result<(), AuthError>,
    pub prompts: Mutex<usize>,
}

impl ScriptedAuthenticator {
    pub fn new(result: Result<(), AuthError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            prompts: Mutex::new(0),
        })
    }
}

#[async_trait]
impl Authenticator for ScriptedAuthenticator {
    async fn authenticate(&self, _reason: &str) -> Result<(), AuthError> {
        *self.prompts.lock().unwrap() += 1;
        self.result.clone()
    }
}

#[derive(Default)]
pub struct RecordingRenderer {
    pub frames: Mutex<Vec<QrFrame>>,
}

impl FrameRenderer for RecordingRenderer {
    fn render_frame(&self, frame: &QrFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}
