//! QrExportController: the animated-QR fallback transport.
//!
//! When the two devices cannot see each other on the LAN, the receiver shows
//! a request code, the sender scans it, and the sender then plays the secret
//! as a looping QR animation for the receiver's camera.
//!
//! ```text
//! Idle ──begin──► Scanning ──request──► Authenticating ──grant──► Exporting ──► Completed
//!                    ▲  │ empty request        │ auth failed          │ export failed
//!                    └──┘ (rejected)           ▼                      ▼
//!                                        Failed(Authentication)  Failed(Export)
//! ```
//!
//! Local authentication must succeed before the engine is asked for anything
//! secret.  The engine's `start_export` takes an [`AuthGrant`], and only this
//! controller can mint one, after the authenticator said yes.
//!
//! Cancel works from every state.  When an export session exists on the
//! engine side it is invalidated (fire-and-forget) so a half-played secret
//! cannot be redeemed later.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use vaultpair_core::{frame_interval, EngineErrorKind, ExportId, FramePoll, QrFrame};

use crate::application::polling::{RetryBackoff, TaskGuard};
use crate::application::ports::{AuthGrant, Authenticator, FrameRenderer, QrExportEngine};

pub use vaultpair_core::protocol::qr::DEFAULT_FRAMES_PER_SECOND;

pub const DEFAULT_FRAME_RETRY_BASE: Duration = Duration::from_millis(100);
pub const DEFAULT_FRAME_RETRY_MAX: Duration = Duration::from_secs(2);

/// Text shown by the authenticator prompt.
const AUTH_REASON: &str = "Confirm it's you to share this vault";

/// Frame rate and retry policy for the export animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrTimings {
    pub frames_per_second: u32,
    pub retry_base: Duration,
    pub retry_max: Duration,
}

impl Default for QrTimings {
    fn default() -> Self {
        Self {
            frames_per_second: DEFAULT_FRAMES_PER_SECOND,
            retry_base: DEFAULT_FRAME_RETRY_BASE,
            retry_max: DEFAULT_FRAME_RETRY_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrFailureReason {
    Authentication,
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrExportState {
    Idle,
    Scanning,
    Authenticating,
    Exporting,
    Completed,
    Failed {
        reason: QrFailureReason,
        message: String,
    },
}

impl QrExportState {
    pub fn name(&self) -> &'static str {
        match self {
            QrExportState::Idle => "idle",
            QrExportState::Scanning => "scanning",
            QrExportState::Authenticating => "authenticating",
            QrExportState::Exporting => "exporting",
            QrExportState::Completed => "completed",
            QrExportState::Failed { .. } => "failed",
        }
    }

    fn is_running(&self) -> bool {
        matches!(
            self,
            QrExportState::Scanning | QrExportState::Authenticating | QrExportState::Exporting
        )
    }
}

/// The engine-side export while frames are playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrExportSession {
    pub export_id: ExportId,
    pub frames_played: u64,
    pub current_frame: Option<QrFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrExportSnapshot {
    pub state: QrExportState,
    pub session: Option<QrExportSession>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QrExportError {
    #[error("an export is already in progress ({state})")]
    Busy { state: &'static str },

    #[error("cannot {action} while the export is {state}")]
    WrongState {
        action: &'static str,
        state: &'static str,
    },

    #[error("the scanned request code is empty")]
    EmptyRequest,
}

struct QrInner {
    state: QrExportState,
    vault_id: Option<String>,
    /// Bumped on every begin and cancel; async results carry the value they
    /// started with and are dropped on mismatch.
    generation: u64,
    session: Option<QrExportSession>,
    frame_loop: Option<TaskGuard>,
}

struct QrShared {
    engine: Arc<dyn QrExportEngine>,
    authenticator: Arc<dyn Authenticator>,
    renderer: Arc<dyn FrameRenderer>,
    timings: QrTimings,
    inner: Mutex<QrInner>,
}

#[derive(Clone)]
pub struct QrExportController {
    shared: Arc<QrShared>,
}

impl QrExportController {
    pub fn new(
        engine: Arc<dyn QrExportEngine>,
        authenticator: Arc<dyn Authenticator>,
        renderer: Arc<dyn FrameRenderer>,
        timings: QrTimings,
    ) -> Self {
        Self {
            shared: Arc::new(QrShared {
                engine,
                authenticator,
                renderer,
                timings,
                inner: Mutex::new(QrInner {
                    state: QrExportState::Idle,
                    vault_id: None,
                    generation: 0,
                    session: None,
                    frame_loop: None,
                }),
            }),
        }
    }

    pub fn snapshot(&self) -> QrExportSnapshot {
        let inner = self.lock();
        QrExportSnapshot {
            state: inner.state.clone(),
            session: inner.session.clone(),
        }
    }

    /// Opens the scanner for exporting `vault_id`.
    ///
    /// # Errors
    ///
    /// [`QrExportError::Busy`] while another export is running.
    pub fn begin(&self, vault_id: impl Into<String>) -> Result<(), QrExportError> {
        let mut inner = self.lock();
        if inner.state.is_running() {
            return Err(QrExportError::Busy {
                state: inner.state.name(),
            });
        }
        inner.generation += 1;
        inner.vault_id = Some(vault_id.into());
        inner.session = None;
        inner.state = QrExportState::Scanning;
        info!(generation = inner.generation, "qr export scanning");
        Ok(())
    }

    /// Handles a request code read by the camera: authenticate, then start
    /// the export.
    ///
    /// Authentication and engine failures end in `Failed`, not in an error.
    ///
    /// # Errors
    ///
    /// [`QrExportError::EmptyRequest`] for a blank scan (still `Scanning`),
    /// [`QrExportError::WrongState`] outside `Scanning`.
    pub async fn on_request_scanned(&self, request: &str) -> Result<(), QrExportError> {
        let request = request.trim();
        let (generation, vault_id) = {
            let mut inner = self.lock();
            if inner.state != QrExportState::Scanning {
                return Err(QrExportError::WrongState {
                    action: "accept a scanned request",
                    state: inner.state.name(),
                });
            }
            if request.is_empty() {
                debug!("ignoring empty scan");
                return Err(QrExportError::EmptyRequest);
            }
            inner.state = QrExportState::Authenticating;
            (inner.generation, inner.vault_id.clone().unwrap_or_default())
        };

        if let Err(e) = self.shared.authenticator.authenticate(AUTH_REASON).await {
            warn!(error = %e, "authentication for qr export failed");
            self.fail_if_current(
                generation,
                QrFailureReason::Authentication,
                format!("Authentication failed: {e}"),
            );
            return Ok(());
        }

        let grant = {
            let inner = self.lock();
            if !Self::is_current(&inner, generation, &QrExportState::Authenticating) {
                debug!("export cancelled during authentication");
                return Ok(());
            }
            AuthGrant::new()
        };

        match self
            .shared
            .engine
            .start_export(&grant, &vault_id, request)
            .await
        {
            Ok(export_id) => self.start_frames(generation, export_id),
            Err(e) => {
                warn!(error = %e, "engine refused to start the export");
                self.fail_if_current(
                    generation,
                    QrFailureReason::Export,
                    format!("Could not start the export: {e}"),
                );
            }
        }
        Ok(())
    }

    /// Stops whatever is happening and returns to `Idle`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel(&self) {
        let mut inner = self.lock();
        if inner.state == QrExportState::Idle {
            debug!("qr export already idle");
            return;
        }
        inner.generation += 1;
        inner.frame_loop = None;
        inner.vault_id = None;
        inner.state = QrExportState::Idle;
        if let Some(session) = inner.session.take() {
            self.invalidate(session.export_id);
        }
        info!("qr export cancelled");
    }

    // ── Internals ─────────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, QrInner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(inner: &QrInner, generation: u64, expected: &QrExportState) -> bool {
        inner.generation == generation && inner.state == *expected
    }

    fn fail_if_current(&self, generation: u64, reason: QrFailureReason, message: String) {
        let mut inner = self.lock();
        if inner.generation != generation || !inner.state.is_running() {
            return;
        }
        inner.frame_loop = None;
        inner.session = None;
        inner.state = QrExportState::Failed { reason, message };
    }

    fn start_frames(&self, generation: u64, export_id: ExportId) {
        let mut inner = self.lock();
        if !Self::is_current(&inner, generation, &QrExportState::Authenticating) {
            debug!(export = %export_id, "export started after cancel; invalidating");
            self.invalidate(export_id);
            return;
        }
        info!(export = %export_id, "qr export playing");
        inner.state = QrExportState::Exporting;
        inner.session = Some(QrExportSession {
            export_id: export_id.clone(),
            frames_played: 0,
            current_frame: None,
        });
        inner.frame_loop = Some(self.spawn_frame_loop(generation, export_id));
    }

    fn spawn_frame_loop(&self, generation: u64, export_id: ExportId) -> TaskGuard {
        let weak = Arc::downgrade(&self.shared);
        let timings = self.shared.timings;
        let period = frame_interval(timings.frames_per_second);

        TaskGuard::new(tokio::spawn(async move {
            let mut backoff = RetryBackoff::new(timings.retry_base, timings.retry_max);
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                let controller = QrExportController { shared };
                match controller.shared.engine.next_frame(&export_id).await {
                    Ok(FramePoll::Frame(data)) => {
                        backoff.reset();
                        if !controller.show_frame(generation, data) {
                            break;
                        }
                    }
                    Ok(FramePoll::Completed) => {
                        controller.finish(generation);
                        break;
                    }
                    Err(e) if !is_transient(e.kind) => {
                        warn!(export = %export_id, error = %e, "export ended by the engine");
                        controller.fail_if_current(
                            generation,
                            QrFailureReason::Export,
                            format!("The export could not continue: {e}"),
                        );
                        controller.invalidate(export_id.clone());
                        break;
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        warn!(
                            export = %export_id,
                            error = %e,
                            attempt = backoff.attempts(),
                            ?delay,
                            "frame fetch failed; retrying"
                        );
                        time::sleep(delay).await;
                    }
                }
            }
        }))
    }

    /// Records and renders the next frame.  Returns `false` when the export
    /// this loop belongs to is gone.
    fn show_frame(&self, generation: u64, data: String) -> bool {
        let frame = {
            let mut inner = self.lock();
            if !Self::is_current(&inner, generation, &QrExportState::Exporting) {
                return false;
            }
            let Some(session) = inner.session.as_mut() else {
                return false;
            };
            let frame = QrFrame {
                sequence: session.frames_played,
                data,
            };
            session.frames_played += 1;
            session.current_frame = Some(frame.clone());
            frame
        };
        self.shared.renderer.render_frame(&frame);
        true
    }

    fn finish(&self, generation: u64) {
        let mut inner = self.lock();
        if !Self::is_current(&inner, generation, &QrExportState::Exporting) {
            return;
        }
        let played = inner.session.as_ref().map_or(0, |s| s.frames_played);
        info!(frames = played, "qr export completed by peer");
        inner.state = QrExportState::Completed;
        inner.session = None;
        inner.frame_loop = None;
    }

    fn invalidate(&self, export_id: ExportId) {
        let engine = Arc::clone(&self.shared.engine);
        tokio::spawn(async move {
            match engine.cancel_export(&export_id).await {
                Ok(()) => debug!(export = %export_id, "export invalidated"),
                Err(e) => warn!(export = %export_id, error = %e, "failed to invalidate export"),
            }
        });
    }
}

/// Whether a failed frame fetch is worth retrying.  A cancelled or rejected
/// export is gone for good.
fn is_transient(kind: EngineErrorKind) -> bool {
    !matches!(kind, EngineErrorKind::Cancelled | EngineErrorKind::Rejected)
}
