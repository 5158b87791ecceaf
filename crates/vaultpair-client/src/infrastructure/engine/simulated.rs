//! Time-scripted pairing and export engines.
//!
//! [`SimulatedEngine`] plays the remote device.  Each session follows a
//! fixed timeline measured from the moment it started (receiver) or the
//! moment a peer was selected (sender):
//!
//! ```text
//! 0 ──────── connect_after ──────── code_after ───── (local confirm) ── peer_confirm_after ── transfer_duration
//!  listening      │      connecting     │     verifying (waits)      │       transferring        │ success
//! ```
//!
//! The simulated peer always confirms; the timeline never passes
//! `verifying` until this device confirms too.  Time is read from
//! `tokio::time::Instant`, so paused-clock tests drive it deterministically.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;
use vaultpair_core::{
    DiscoveredPeer, EngineError, EngineErrorKind, EngineState, EngineStatus, ExportId, FramePoll,
    PairingRole, SessionId, VaultTransferPayload,
};

use crate::application::ports::{AuthGrant, PairingEngine, QrExportEngine};

/// Timeline and fixtures of the simulated peer.
#[derive(Debug, Clone)]
pub struct SimulationScript {
    pub connect_after: Duration,
    pub code_after: Duration,
    pub peer_confirm_after: Duration,
    pub transfer_duration: Duration,
    pub verification_code: String,
    pub peer_name: String,
    pub peers: Vec<DiscoveredPeer>,
    pub payload: String,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            connect_after: Duration::from_secs(2),
            code_after: Duration::from_secs(3),
            peer_confirm_after: Duration::from_secs(1),
            transfer_duration: Duration::from_secs(2),
            verification_code: "482913".to_string(),
            peer_name: "Simulated Phone".to_string(),
            peers: vec![DiscoveredPeer {
                id: "sim-peer-1".to_string(),
                display_name: "Simulated Phone".to_string(),
                network_address: "192.168.1.42:47100".to_string(),
            }],
            payload: "vaultpair-simulated-credential".to_string(),
        }
    }
}

#[derive(Debug)]
struct SimSession {
    /// Start of the timeline; `None` until a sender selects a peer.
    started: Option<Instant>,
    advertising: bool,
    confirmed_at: Option<Instant>,
    payload_delivered: bool,
}

/// In-process [`PairingEngine`] driven by a [`SimulationScript`].
pub struct SimulatedEngine {
    script: SimulationScript,
    sessions: Mutex<HashMap<SessionId, SimSession>>,
}

impl SimulatedEngine {
    pub fn new(script: SimulationScript) -> Self {
        Self {
            script,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Number of sessions the engine still holds resources for.
    pub fn open_sessions(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SimSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unknown(session: SessionId) -> EngineError {
        EngineError::new(
            EngineErrorKind::Internal,
            format!("no engine session {session}"),
        )
    }

    fn status_of(&self, sim: &SimSession) -> EngineStatus {
        let script = &self.script;
        let Some(started) = sim.started else {
            return EngineStatus::with_state(if sim.advertising {
                EngineState::Listening
            } else {
                EngineState::Idle
            });
        };

        let elapsed = started.elapsed();
        let mut status = if elapsed < script.connect_after {
            EngineStatus::with_state(EngineState::Listening)
        } else if elapsed < script.code_after {
            EngineStatus::with_state(EngineState::Connecting)
        } else {
            let mut status = EngineStatus::with_state(EngineState::Verifying);
            status.verification_code = Some(script.verification_code.clone());
            if let Some(confirmed_at) = sim.confirmed_at {
                let since = confirmed_at.elapsed();
                if since >= script.peer_confirm_after + script.transfer_duration {
                    status.state = EngineState::Success;
                } else if since >= script.peer_confirm_after {
                    status.state = EngineState::Transferring;
                }
            }
            status
        };
        if elapsed >= script.connect_after {
            status.connected_device = Some(script.peer_name.clone());
        }
        status
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new(SimulationScript::default())
    }
}

#[async_trait]
impl PairingEngine for SimulatedEngine {
    async fn start_discovery(&self, session: SessionId) -> Result<(), EngineError> {
        let mut sessions = self.lock();
        if sessions.values().any(|s| s.advertising) {
            return Err(EngineError::new(
                EngineErrorKind::ResourceBusy,
                "discovery port already in use",
            ));
        }
        sessions
            .entry(session)
            .or_insert(SimSession {
                started: None,
                advertising: false,
                confirmed_at: None,
                payload_delivered: false,
            })
            .advertising = true;
        debug!(%session, "simulated discovery started");
        Ok(())
    }

    async fn stop_discovery(&self, session: SessionId) -> Result<(), EngineError> {
        if let Some(sim) = self.lock().get_mut(&session) {
            sim.advertising = false;
        }
        Ok(())
    }

    async fn list_peers(&self, session: SessionId) -> Result<Vec<DiscoveredPeer>, EngineError> {
        let sessions = self.lock();
        let sim = sessions.get(&session).ok_or_else(|| Self::unknown(session))?;
        if !sim.advertising {
            return Ok(Vec::new());
        }
        // mDNS answers arrive once per interface.
        let mut peers = self.script.peers.clone();
        peers.extend(self.script.peers.iter().cloned());
        Ok(peers)
    }

    async fn initiate_pairing(
        &self,
        session: SessionId,
        peer_id: &str,
        vault_id: &str,
    ) -> Result<(), EngineError> {
        if !self.script.peers.iter().any(|p| p.id == peer_id) {
            return Err(EngineError::new(
                EngineErrorKind::Rejected,
                format!("peer {peer_id} is not reachable"),
            ));
        }
        let mut sessions = self.lock();
        let sim = sessions.get_mut(&session).ok_or_else(|| Self::unknown(session))?;
        sim.started = Some(Instant::now());
        info!(%session, peer = peer_id, vault = vault_id, "simulated pairing initiated");
        Ok(())
    }

    async fn pairing_status(&self, session: SessionId) -> Result<EngineStatus, EngineError> {
        let mut sessions = self.lock();
        let sim = sessions.get_mut(&session).ok_or_else(|| Self::unknown(session))?;
        // A receiver's timeline starts when it begins advertising.
        if sim.started.is_none() && sim.advertising {
            sim.started = Some(Instant::now());
        }
        Ok(self.status_of(sim))
    }

    async fn confirm_pairing(
        &self,
        session: SessionId,
        role: PairingRole,
    ) -> Result<(), EngineError> {
        let mut sessions = self.lock();
        let sim = sessions.get_mut(&session).ok_or_else(|| Self::unknown(session))?;
        if sim.confirmed_at.is_none() {
            sim.confirmed_at = Some(Instant::now());
        }
        debug!(%session, %role, "simulated confirmation recorded");
        Ok(())
    }

    async fn cancel_pairing(&self, session: SessionId) -> Result<(), EngineError> {
        if self.lock().remove(&session).is_some() {
            debug!(%session, "simulated session released");
        }
        Ok(())
    }

    async fn received_payload(
        &self,
        session: SessionId,
    ) -> Result<Option<VaultTransferPayload>, EngineError> {
        let mut sessions = self.lock();
        let sim = sessions.get_mut(&session).ok_or_else(|| Self::unknown(session))?;
        if sim.payload_delivered || self.status_of(sim).state != EngineState::Success {
            return Ok(None);
        }
        sim.payload_delivered = true;
        Ok(Some(VaultTransferPayload::new(self.script.payload.clone())))
    }
}

// ── QR export ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct SimExport {
    next: usize,
}

/// In-process [`QrExportEngine`] that cycles a fixed set of frames
/// `loops` times, then reports completion.
pub struct SimulatedQrEngine {
    frames: Vec<String>,
    loops: usize,
    exports: Mutex<HashMap<ExportId, SimExport>>,
}

impl SimulatedQrEngine {
    pub fn new(frames: Vec<String>, loops: usize) -> Self {
        Self {
            frames,
            loops: loops.max(1),
            exports: Mutex::new(HashMap::new()),
        }
    }

    /// Number of exports that can still be redeemed.
    pub fn live_exports(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ExportId, SimExport>> {
        self.exports.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SimulatedQrEngine {
    fn default() -> Self {
        let frames = (1..=4).map(|i| format!("ur:vault/{i}-4/simulated")).collect();
        Self::new(frames, 3)
    }
}

#[async_trait]
impl QrExportEngine for SimulatedQrEngine {
    async fn start_export(
        &self,
        grant: &AuthGrant,
        vault_id: &str,
        request: &str,
    ) -> Result<ExportId, EngineError> {
        if !request.starts_with("ur:") {
            return Err(EngineError::new(
                EngineErrorKind::Rejected,
                "scanned code is not a vault request",
            ));
        }
        let id = ExportId::new(Uuid::new_v4().to_string());
        self.lock().insert(id.clone(), SimExport { next: 0 });
        debug!(
            export = %id,
            vault = vault_id,
            authenticated_for = ?grant.granted_at().elapsed(),
            "simulated export started"
        );
        Ok(id)
    }

    async fn next_frame(&self, export: &ExportId) -> Result<FramePoll, EngineError> {
        let mut exports = self.lock();
        let sim = exports.get_mut(export).ok_or_else(|| {
            EngineError::new(EngineErrorKind::Cancelled, format!("export {export} is gone"))
        })?;
        if self.frames.is_empty() || sim.next >= self.frames.len() * self.loops {
            exports.remove(export);
            return Ok(FramePoll::Completed);
        }
        let frame = self.frames[sim.next % self.frames.len()].clone();
        sim.next += 1;
        Ok(FramePoll::Frame(frame))
    }

    async fn cancel_export(&self, export: &ExportId) -> Result<(), EngineError> {
        self.lock().remove(export);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time;

    fn script() -> SimulationScript {
        SimulationScript::default()
    }

    #[tokio::test(start_paused = true)]
    async fn test_receiver_timeline_waits_for_confirmation() {
        // Arrange
        let engine = SimulatedEngine::new(script());
        let session = SessionId::new();
        engine.start_discovery(session).await.unwrap();

        // Act / Assert
        let first = engine.pairing_status(session).await.unwrap();
        assert_eq!(first.state, EngineState::Listening);

        time::advance(Duration::from_millis(2500)).await;
        let connecting = engine.pairing_status(session).await.unwrap();
        assert_eq!(connecting.state, EngineState::Connecting);
        assert_eq!(connecting.connected_device.as_deref(), Some("Simulated Phone"));

        time::advance(Duration::from_secs(60)).await;
        let verifying = engine.pairing_status(session).await.unwrap();
        assert_eq!(verifying.state, EngineState::Verifying);
        assert_eq!(verifying.verification_code.as_deref(), Some("482913"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmation_leads_to_success_and_one_payload() {
        let engine = SimulatedEngine::new(script());
        let session = SessionId::new();
        engine.start_discovery(session).await.unwrap();
        engine.pairing_status(session).await.unwrap();
        time::advance(Duration::from_secs(4)).await;

        engine
            .confirm_pairing(session, PairingRole::Receiver)
            .await
            .unwrap();
        time::advance(Duration::from_millis(1500)).await;
        assert_eq!(
            engine.pairing_status(session).await.unwrap().state,
            EngineState::Transferring
        );
        assert!(engine.received_payload(session).await.unwrap().is_none());

        time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            engine.pairing_status(session).await.unwrap().state,
            EngineState::Success
        );
        let payload = engine.received_payload(session).await.unwrap();
        assert_eq!(payload.map(|p| p.len()), Some(script().payload.len()));
        assert!(engine.received_payload(session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_advertiser_gets_resource_busy() {
        let engine = SimulatedEngine::default();
        engine.start_discovery(SessionId::new()).await.unwrap();

        let err = engine.start_discovery(SessionId::new()).await.unwrap_err();

        assert_eq!(err.kind, EngineErrorKind::ResourceBusy);
    }

    #[tokio::test]
    async fn test_cancel_releases_session_and_is_repeatable() {
        let engine = SimulatedEngine::default();
        let session = SessionId::new();
        engine.start_discovery(session).await.unwrap();

        engine.cancel_pairing(session).await.unwrap();
        engine.cancel_pairing(session).await.unwrap();

        assert_eq!(engine.open_sessions(), 0);
        assert!(engine.pairing_status(session).await.is_err());
        engine.start_discovery(SessionId::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_peers_reports_duplicates_while_advertising() {
        let engine = SimulatedEngine::default();
        let session = SessionId::new();
        engine.start_discovery(session).await.unwrap();

        assert_eq!(engine.list_peers(session).await.unwrap().len(), 2);

        engine.stop_discovery(session).await.unwrap();
        assert!(engine.list_peers(session).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initiate_with_unknown_peer_is_rejected() {
        let engine = SimulatedEngine::default();
        let session = SessionId::new();
        engine.start_discovery(session).await.unwrap();

        let err = engine
            .initiate_pairing(session, "ghost", "vault-1")
            .await
            .unwrap_err();

        assert_eq!(err.kind, EngineErrorKind::Rejected);
    }

    #[tokio::test]
    async fn test_qr_engine_plays_frames_then_completes() {
        // Arrange
        let engine = SimulatedQrEngine::new(vec!["a".to_string(), "b".to_string()], 2);
        let id = engine
            .start_export(&AuthGrant::new(), "vault-1", "ur:request/1")
            .await
            .unwrap();

        // Act
        let mut played = Vec::new();
        while let FramePoll::Frame(f) = engine.next_frame(&id).await.unwrap() {
            played.push(f);
        }

        // Assert
        assert_eq!(played, vec!["a", "b", "a", "b"]);
        assert_eq!(engine.live_exports(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_export_cannot_be_redeemed() {
        let engine = SimulatedQrEngine::default();
        let id = engine
            .start_export(&AuthGrant::new(), "vault-1", "ur:request/1")
            .await
            .unwrap();

        engine.cancel_export(&id).await.unwrap();

        let err = engine.next_frame(&id).await.unwrap_err();
        assert_eq!(err.kind, EngineErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_qr_engine_rejects_foreign_request() {
        let engine = SimulatedQrEngine::default();

        let result = engine
            .start_export(&AuthGrant::new(), "vault-1", "https://example.com")
            .await;

        assert!(result.is_err());
        assert_eq!(engine.live_exports(), 0);
    }
}
