//! PairingController: drives one pairing session against the engine.
//!
//! The controller owns the only mutable pairing state in the client.  It
//! decides *when* things happen (user actions, poll ticks, deadlines) and
//! feeds the resulting events through the pure transition function in
//! `vaultpair_core`, which decides *what* they do.
//!
//! # Concurrency model (for beginners)
//!
//! All state lives in one `std::sync::Mutex<Inner>`.  The lock is only ever
//! held for short synchronous sections and is always released before an
//! engine call is awaited, so a slow engine can never block a cancel.
//!
//! Because the lock is released around every engine call, a call may come
//! back after the session it was made for has been cancelled or replaced.
//! Every call therefore remembers the [`SessionId`] it was issued for, and its
//! result is dropped unless that session is still the current one *and* still
//! active.  This is what stops a late `success` from an old session
//! resurrecting a cancelled dialog.
//!
//! Observers get the session as an immutable [`PairingSession`] snapshot,
//! published through a `tokio::sync::watch` channel.  The whole value is
//! replaced on every change.
//!
//! # Background loops
//!
//! | State                                           | Loop                 |
//! |-------------------------------------------------|----------------------|
//! | `Discovering`                                   | peer list, 1000 ms   |
//! | `Listening`, `Connecting`, `Verifying`, `Transferring` | status, 500 ms |
//!
//! The loop is a [`TaskGuard`] stored in `Inner`; leaving the state drops the
//! guard, which aborts the task.  Phase deadlines are checked on each status
//! tick, and a status call is never awaited past the current phase's
//! deadline, so a hung engine still times the session out.
//!
//! # Releasing engine resources
//!
//! Entering `Success` or `Error`, cancelling, or closing the dialog spawns a
//! fire-and-forget task that tears the session down on the engine side and
//! stops discovery.  It runs at most once per session and its failures are
//! only logged.  Teardown does not wait for it, but the next `start` or
//! `retry` does, so a new session never races the old one for the engine's
//! discovery socket.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use vaultpair_core::{
    EngineError, EngineState, EngineStatus, FailureKind, InvalidTransition, PairingEvent,
    PairingFailure, PairingRole, PairingSession, PairingState, SessionId,
};

use crate::application::discovery::DiscoveryClient;
use crate::application::polling::{spawn_interval, TaskGuard};
use crate::application::ports::{PairingEngine, VaultImporter};
use crate::application::transfer::{TransferExecutor, TransferOutcome};
use crate::application::verification::{GateDecision, GateError, VerificationGate};

/// Status poll cadence while a session waits on the engine.
pub const DEFAULT_STATUS_POLL: Duration = Duration::from_millis(500);
/// Peer list poll cadence while the sender is choosing a peer.
pub const DEFAULT_DISCOVERY_POLL: Duration = Duration::from_millis(1000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

/// Poll cadences and per-phase deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingTimings {
    pub status_poll: Duration,
    pub discovery_poll: Duration,
    pub connect_timeout: Duration,
    pub verification_timeout: Duration,
    pub transfer_timeout: Duration,
}

impl Default for PairingTimings {
    fn default() -> Self {
        Self {
            status_poll: DEFAULT_STATUS_POLL,
            discovery_poll: DEFAULT_DISCOVERY_POLL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
            transfer_timeout: DEFAULT_TRANSFER_TIMEOUT,
        }
    }
}

impl PairingTimings {
    /// How long the session may stay in `state` before it times out.
    /// `None` for states that wait on the user indefinitely.
    pub fn deadline_for(&self, state: &PairingState) -> Option<Duration> {
        match state {
            PairingState::Connecting => Some(self.connect_timeout),
            PairingState::Verifying => Some(self.verification_timeout),
            PairingState::Transferring => Some(self.transfer_timeout),
            _ => None,
        }
    }
}

/// A request the controller refused.  The session is left unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("a pairing session is already in progress ({state})")]
    SessionActive { state: &'static str },

    #[error("there is no pairing session")]
    NoSession,

    #[error("cannot {action} while the session is {state}")]
    WrongState {
        action: &'static str,
        state: &'static str,
    },

    #[error("no discovered device has id {0:?}")]
    UnknownPeer(String),

    #[error("the verification code has already been confirmed")]
    AlreadyConfirmed,

    #[error("a {0:?} failure cannot be fixed by pairing again")]
    NotRetryable(FailureKind),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

// ── Internal state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollKind {
    Peers,
    Status,
}

impl PollKind {
    fn for_state(state: &PairingState) -> Option<PollKind> {
        if state.polls_peers() {
            Some(PollKind::Peers)
        } else if state.polls_status() {
            Some(PollKind::Status)
        } else {
            None
        }
    }
}

struct Poller {
    kind: PollKind,
    session: SessionId,
    _task: TaskGuard,
}

struct Inner {
    session: PairingSession,
    vault_id: Option<String>,
    gate: VerificationGate,
    phase_started: Instant,
    released: bool,
    poller: Option<Poller>,
}

impl Inner {
    fn idle() -> Self {
        Self {
            session: PairingSession::idle(),
            vault_id: None,
            gate: VerificationGate::new(),
            phase_started: Instant::now(),
            released: false,
            poller: None,
        }
    }

    fn fresh(session_id: SessionId, role: PairingRole, vault_id: Option<String>) -> Self {
        let mut inner = Self::idle();
        inner.session.session_id = Some(session_id);
        inner.session.role = Some(role);
        inner.vault_id = vault_id;
        inner
    }

    /// Whether a result tagged with `session` may still change anything.
    fn accepts(&self, session: SessionId) -> bool {
        self.session.session_id == Some(session) && self.session.state.is_active()
    }
}

/// What is left to do after a status report was absorbed under the lock.
enum StatusFollowUp {
    Nothing,
    FinishTransfer(PairingRole),
}

struct Shared {
    engine: Arc<dyn PairingEngine>,
    discovery: DiscoveryClient,
    transfer: TransferExecutor,
    timings: PairingTimings,
    inner: Mutex<Inner>,
    /// Engine-side teardown of the most recent released session.  Each
    /// release task waits for the one before it.
    pending_release: Mutex<Option<JoinHandle<()>>>,
    snapshot_tx: watch::Sender<PairingSession>,
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Drives pairing sessions for either role.  Cheap to clone; clones share
/// the same session.
#[derive(Clone)]
pub struct PairingController {
    shared: Arc<Shared>,
}

impl PairingController {
    pub fn new(
        engine: Arc<dyn PairingEngine>,
        importer: Arc<dyn VaultImporter>,
        timings: PairingTimings,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(PairingSession::idle());
        Self {
            shared: Arc::new(Shared {
                discovery: DiscoveryClient::new(Arc::clone(&engine)),
                transfer: TransferExecutor::new(Arc::clone(&engine), importer),
                engine,
                timings,
                inner: Mutex::new(Inner::idle()),
                pending_release: Mutex::new(None),
                snapshot_tx,
            }),
        }
    }

    pub fn timings(&self) -> PairingTimings {
        self.shared.timings
    }

    /// The current session.
    pub fn snapshot(&self) -> PairingSession {
        self.lock().session.clone()
    }

    /// A receiver that sees every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PairingSession> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Whether this device has confirmed the code of the current session.
    pub fn is_locally_confirmed(&self) -> bool {
        self.lock().gate.is_confirmed()
    }

    /// Opens "Pair Device": advertise this device and wait for a sender.
    ///
    /// Engine failures do not return an error; they put the session into
    /// `Error` like every other engine failure.
    ///
    /// # Errors
    ///
    /// [`ControllerError::SessionActive`] when a session is already running.
    pub async fn start_receiver(&self) -> Result<SessionId, ControllerError> {
        self.start(PairingRole::Receiver, None).await
    }

    /// Opens "Share Vault" for `vault_id`: scan for receivers.
    ///
    /// # Errors
    ///
    /// [`ControllerError::SessionActive`] when a session is already running.
    pub async fn start_sender(
        &self,
        vault_id: impl Into<String>,
    ) -> Result<SessionId, ControllerError> {
        self.start(PairingRole::Sender, Some(vault_id.into())).await
    }

    async fn start(
        &self,
        role: PairingRole,
        vault_id: Option<String>,
    ) -> Result<SessionId, ControllerError> {
        let session = {
            let mut inner = self.lock();
            if inner.session.state != PairingState::Idle {
                return Err(ControllerError::SessionActive {
                    state: inner.session.state.name(),
                });
            }
            let session = SessionId::new();
            *inner = Inner::fresh(session, role, vault_id);
            self.enter(&mut inner, role, PairingEvent::Start)?;
            session
        };
        info!(%session, %role, "pairing session started");
        self.begin_discovery(session).await;
        Ok(session)
    }

    async fn begin_discovery(&self, session: SessionId) {
        self.await_pending_release().await;
        if !self.lock().accepts(session) {
            debug!(%session, "session ended before discovery started");
            return;
        }
        match self.shared.discovery.start(session).await {
            Ok(()) => {
                let still_wanted = self.lock().accepts(session);
                if !still_wanted {
                    debug!(%session, "session ended while discovery was starting");
                    self.shared.discovery.stop(session).await;
                }
            }
            Err(e) => {
                warn!(%session, error = %e, "failed to start discovery");
                self.fail(session, e);
            }
        }
    }

    /// Sender: pair with a peer from the discovered list.
    ///
    /// # Errors
    ///
    /// [`ControllerError::WrongState`] outside a sender's `Discovering` state,
    /// [`ControllerError::UnknownPeer`] when `peer_id` is not in the list.
    pub async fn select_peer(&self, peer_id: &str) -> Result<(), ControllerError> {
        let (session, vault_id) = {
            let mut inner = self.lock();
            let state = inner.session.state.name();
            if inner.session.state != PairingState::Discovering
                || inner.session.role != Some(PairingRole::Sender)
            {
                return Err(ControllerError::WrongState {
                    action: "select a peer",
                    state,
                });
            }
            let session = inner.session.session_id.ok_or(ControllerError::NoSession)?;
            let peer = inner
                .session
                .discovered_peers
                .iter()
                .find(|p| p.id == peer_id)
                .cloned()
                .ok_or_else(|| ControllerError::UnknownPeer(peer_id.to_string()))?;

            self.enter(&mut inner, PairingRole::Sender, PairingEvent::PeerSelected)?;
            inner.session.peer_name = Some(peer.display_name);
            self.publish(&inner);
            (session, inner.vault_id.clone().unwrap_or_default())
        };

        info!(%session, peer = peer_id, "initiating pairing");
        if let Err(e) = self
            .shared
            .engine
            .initiate_pairing(session, peer_id, &vault_id)
            .await
        {
            warn!(%session, error = %e, "failed to initiate pairing");
            self.fail(session, e);
        }
        Ok(())
    }

    /// The user says the codes match.  Sent to the engine exactly once.
    ///
    /// This alone does not move the session on; see the module docs.
    ///
    /// # Errors
    ///
    /// [`ControllerError::WrongState`] outside `Verifying`,
    /// [`ControllerError::AlreadyConfirmed`] on a second call.
    pub async fn confirm(&self) -> Result<(), ControllerError> {
        let (session, role) = {
            let mut inner = self.lock();
            let state = inner.session.state.name();
            if inner.session.state != PairingState::Verifying {
                return Err(ControllerError::WrongState {
                    action: "confirm",
                    state,
                });
            }
            let session = inner.session.session_id.ok_or(ControllerError::NoSession)?;
            let role = inner.session.role.ok_or(ControllerError::NoSession)?;
            inner.gate.begin_confirm().map_err(|e| match e {
                GateError::AlreadyConfirmed => ControllerError::AlreadyConfirmed,
                GateError::NoCode => ControllerError::WrongState {
                    action: "confirm",
                    state,
                },
            })?;
            (session, role)
        };

        info!(%session, %role, "verification code confirmed on this device");
        if let Err(e) = self.shared.engine.confirm_pairing(session, role).await {
            warn!(%session, error = %e, "engine rejected confirmation");
            self.fail(session, e);
        }
        Ok(())
    }

    /// User cancel or back.  Always ends in `Idle`; a no-op when idle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel(&self) {
        self.teardown(PairingEvent::Cancel);
    }

    /// Dialog closed.  Dismisses a finished session or cancels a running one.
    pub fn close(&self) {
        let event = if self.lock().session.state.is_terminal() {
            PairingEvent::Reset
        } else {
            PairingEvent::Cancel
        };
        self.teardown(event);
    }

    fn teardown(&self, event: PairingEvent) {
        let mut inner = self.lock();
        let (Some(session), Some(role)) = (inner.session.session_id, inner.session.role) else {
            debug!(event = event.name(), "no pairing session; nothing to tear down");
            return;
        };
        if let Err(e) = inner.session.state.apply(role, &event) {
            warn!(%session, error = %e, "unexpected teardown transition");
        }

        self.release(&mut inner);
        inner.poller = None;
        *inner = Inner::idle();
        self.publish(&inner);
        info!(%session, event = event.name(), "pairing session ended");
    }

    /// Starts over after a failure with a new session id and the same role.
    ///
    /// # Errors
    ///
    /// [`ControllerError::NotRetryable`] for import failures,
    /// [`ControllerError::WrongState`] outside `Error`.
    pub async fn retry(&self) -> Result<SessionId, ControllerError> {
        let session = {
            let mut inner = self.lock();
            let role = inner.session.role.ok_or(ControllerError::NoSession)?;
            let previous = inner.session.state.clone();
            match &previous {
                PairingState::Error(failure) if !failure.kind.is_retryable() => {
                    return Err(ControllerError::NotRetryable(failure.kind));
                }
                PairingState::Error(_) => {}
                other => {
                    return Err(ControllerError::WrongState {
                        action: "retry",
                        state: other.name(),
                    })
                }
            }

            self.release(&mut inner);
            let session = SessionId::new();
            let vault_id = inner.vault_id.take();
            *inner = Inner::fresh(session, role, vault_id);
            inner.session.state = previous;
            self.enter(&mut inner, role, PairingEvent::Retry)?;
            session
        };
        info!(%session, "pairing retried with a new session");
        self.begin_discovery(session).await;
        Ok(session)
    }

    /// Absorbs one engine status report for `session`.
    ///
    /// Reports for any session other than the current active one are
    /// discarded.  The status poller calls this on every tick.
    pub async fn apply_status(&self, session: SessionId, status: EngineStatus) {
        let follow_up = {
            let mut inner = self.lock();
            if !inner.accepts(session) {
                debug!(%session, state = ?status.state, "discarding stale engine status");
                return;
            }
            let Some(role) = inner.session.role else {
                return;
            };
            let follow_up = self.absorb_status(&mut inner, role, &status);
            self.publish(&inner);
            follow_up
        };

        let StatusFollowUp::FinishTransfer(role) = follow_up else {
            return;
        };
        let outcome = self.shared.transfer.complete(session, role).await;

        let mut inner = self.lock();
        if !inner.accepts(session) {
            debug!(%session, "session ended while the transfer was being finished");
            return;
        }
        let event = match outcome {
            TransferOutcome::Completed => PairingEvent::TransferCompleted,
            TransferOutcome::Pending => return,
            TransferOutcome::Failed(failure) => PairingEvent::Fault(failure),
        };
        self.enter_or_log(&mut inner, role, event);
    }

    fn absorb_status(
        &self,
        inner: &mut Inner,
        role: PairingRole,
        status: &EngineStatus,
    ) -> StatusFollowUp {
        if let Some(device) = &status.connected_device {
            inner.session.peer_name = Some(device.clone());
        }

        if let Some(err) = status.engine_error() {
            let failure = err.into_failure(&inner.session.state);
            warn!(kind = ?failure.kind, error = %failure, "engine reported a failure");
            self.enter_or_log(inner, role, PairingEvent::Fault(failure));
            return StatusFollowUp::Nothing;
        }

        let local = inner.session.state.clone();
        match status.state {
            EngineState::Idle | EngineState::Listening => {}
            EngineState::Connecting => {
                if local == PairingState::Listening {
                    self.enter_or_log(inner, role, PairingEvent::PeerConnected);
                }
            }
            EngineState::Verifying => match status.code() {
                Ok(Some(code)) => {
                    if matches!(local, PairingState::Listening | PairingState::Connecting) {
                        inner.gate.present(code.clone());
                        inner.session.verification_code = Some(code);
                        self.enter_or_log(inner, role, PairingEvent::CodeIssued);
                    }
                }
                Ok(None) => {
                    if local == PairingState::Listening {
                        self.enter_or_log(inner, role, PairingEvent::PeerConnected);
                    }
                }
                Err(e) => {
                    let failure = PairingFailure::new(
                        FailureKind::Verification,
                        format!("The engine issued an unreadable verification code: {e}"),
                    );
                    self.enter_or_log(inner, role, PairingEvent::Fault(failure));
                }
            },
            EngineState::Transferring | EngineState::Success => {
                match inner.gate.evaluate(status) {
                    GateDecision::Violation => {
                        let failure = PairingFailure::new(
                            FailureKind::Verification,
                            "The other device reported a confirmed pairing before this device confirmed the code",
                        );
                        warn!("engine advanced past verification without local confirmation");
                        self.enter_or_log(inner, role, PairingEvent::Fault(failure));
                    }
                    GateDecision::Hold => {}
                    GateDecision::Release => {
                        if local == PairingState::Verifying {
                            self.enter_or_log(inner, role, PairingEvent::BothConfirmed);
                        }
                        if status.state == EngineState::Success
                            && inner.session.state == PairingState::Transferring
                        {
                            return StatusFollowUp::FinishTransfer(role);
                        }
                    }
                }
            }
            // Both carry an engine error and were handled above.
            EngineState::Error | EngineState::Cancelled => {}
        }
        StatusFollowUp::Nothing
    }

    // ── Poll ticks ────────────────────────────────────────────────────────────

    async fn poll_peers_tick(&self, session: SessionId) -> ControlFlow<()> {
        {
            let inner = self.lock();
            if !inner.accepts(session) || !inner.session.state.polls_peers() {
                return ControlFlow::Break(());
            }
        }

        let peers = self.shared.discovery.poll(session).await;

        let mut inner = self.lock();
        if !inner.accepts(session) || !inner.session.state.polls_peers() {
            debug!(%session, "discarding stale peer list");
            return ControlFlow::Break(());
        }
        inner.session.discovered_peers = peers;
        self.publish(&inner);
        ControlFlow::Continue(())
    }

    async fn poll_status_tick(&self, session: SessionId) -> ControlFlow<()> {
        let time_left = {
            let mut inner = self.lock();
            if !inner.accepts(session) || !inner.session.state.polls_status() {
                return ControlFlow::Break(());
            }
            if self.check_deadline(&mut inner) {
                return ControlFlow::Break(());
            }
            self.time_left(&inner)
        };

        let polled = self.shared.engine.pairing_status(session);
        let result = match time_left {
            Some(left) => match time::timeout(left, polled).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(%session, ?left, "status poll still pending at the phase deadline");
                    let mut inner = self.lock();
                    if !inner.accepts(session) || self.check_deadline(&mut inner) {
                        return ControlFlow::Break(());
                    }
                    return ControlFlow::Continue(());
                }
            },
            None => polled.await,
        };

        match result {
            Ok(status) => {
                debug!(%session, state = ?status.state, "polled engine status");
                self.apply_status(session, status).await;
            }
            Err(e) => {
                warn!(%session, error = %e, "status poll failed");
                self.fail(session, e);
            }
        }
        ControlFlow::Continue(())
    }

    /// Time remaining before the current phase times out, if it has a deadline.
    fn time_left(&self, inner: &Inner) -> Option<Duration> {
        self.shared
            .timings
            .deadline_for(&inner.session.state)
            .map(|limit| limit.saturating_sub(inner.phase_started.elapsed()))
    }

    /// Fails the session if the current phase ran past its deadline.
    fn check_deadline(&self, inner: &mut Inner) -> bool {
        let state = inner.session.state.clone();
        let Some(limit) = self.shared.timings.deadline_for(&state) else {
            return false;
        };
        if inner.phase_started.elapsed() < limit {
            return false;
        }
        let Some(role) = inner.session.role else {
            return false;
        };
        let failure = PairingFailure::new(
            FailureKind::Timeout,
            format!(
                "The other device did not respond within {}s while {}",
                limit.as_secs(),
                state.name()
            ),
        );
        warn!(state = state.name(), ?limit, "pairing phase timed out");
        self.enter_or_log(inner, role, PairingEvent::Fault(failure));
        true
    }

    // ── State plumbing ────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `event` and runs every side effect of the new state: deadline
    /// reset, resource release, poller switch, snapshot publication.
    fn enter(
        &self,
        inner: &mut Inner,
        role: PairingRole,
        event: PairingEvent,
    ) -> Result<(), InvalidTransition> {
        let previous = inner.session.state.clone();
        let next = previous.apply(role, &event)?;
        if next != previous {
            info!(
                session = ?inner.session.session_id,
                %role,
                from = previous.name(),
                to = next.name(),
                "pairing state changed"
            );
            inner.phase_started = Instant::now();
        }
        inner.session.error = next.failure().map(|f| f.message.clone());
        inner.session.state = next;

        if inner.session.state.is_terminal() {
            self.release(inner);
        }
        self.sync_poller(inner);
        self.publish(inner);
        Ok(())
    }

    fn enter_or_log(&self, inner: &mut Inner, role: PairingRole, event: PairingEvent) {
        if let Err(e) = self.enter(inner, role, event) {
            warn!(error = %e, "ignored event");
        }
    }

    /// Moves the session to `Error` for an engine failure, unless the result
    /// belongs to a session that is no longer current.
    fn fail(&self, session: SessionId, error: EngineError) {
        let mut inner = self.lock();
        if !inner.accepts(session) {
            debug!(%session, error = %error, "discarding engine error for stale session");
            return;
        }
        let Some(role) = inner.session.role else {
            return;
        };
        let failure = error.into_failure(&inner.session.state);
        self.enter_or_log(&mut inner, role, PairingEvent::Fault(failure));
    }

    fn publish(&self, inner: &Inner) {
        self.shared.snapshot_tx.send_if_modified(|current| {
            if *current == inner.session {
                false
            } else {
                *current = inner.session.clone();
                true
            }
        });
    }

    fn sync_poller(&self, inner: &mut Inner) {
        let wanted = match (PollKind::for_state(&inner.session.state), inner.session.session_id) {
            (Some(kind), Some(session)) => Some((kind, session)),
            _ => None,
        };
        let running = inner.poller.as_ref().map(|p| (p.kind, p.session));
        if wanted == running {
            return;
        }
        // Dropping the old guard aborts its task.
        inner.poller = None;
        if let Some((kind, session)) = wanted {
            debug!(%session, ?kind, "starting poller");
            inner.poller = Some(self.spawn_poller(kind, session));
        }
    }

    fn spawn_poller(&self, kind: PollKind, session: SessionId) -> Poller {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let period = match kind {
            PollKind::Peers => self.shared.timings.discovery_poll,
            PollKind::Status => self.shared.timings.status_poll,
        };
        let task = spawn_interval(period, move || {
            let weak = weak.clone();
            async move {
                let Some(shared) = weak.upgrade() else {
                    return ControlFlow::Break(());
                };
                let controller = PairingController { shared };
                match kind {
                    PollKind::Peers => controller.poll_peers_tick(session).await,
                    PollKind::Status => controller.poll_status_tick(session).await,
                }
            }
        });
        Poller {
            kind,
            session,
            _task: task,
        }
    }

    /// Spawns the engine-side teardown for the current session, once.
    fn release(&self, inner: &mut Inner) {
        if inner.released {
            return;
        }
        let Some(session) = inner.session.session_id else {
            return;
        };
        inner.released = true;

        let mut pending = self
            .shared
            .pending_release
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = pending.take();
        let shared = Arc::clone(&self.shared);
        *pending = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            shared.discovery.stop(session).await;
            match shared.engine.cancel_pairing(session).await {
                Ok(()) => debug!(%session, "engine session released"),
                Err(e) => warn!(%session, error = %e, "failed to release engine session"),
            }
        }));
    }

    /// Waits for the previous session's engine-side teardown, bounded by the
    /// connect timeout.
    async fn await_pending_release(&self) {
        let pending = self
            .shared
            .pending_release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = pending else {
            return;
        };
        match time::timeout(self.shared.timings.connect_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "previous session release task failed"),
            Err(_) => warn!("previous session is still being released; starting anyway"),
        }
    }
}
