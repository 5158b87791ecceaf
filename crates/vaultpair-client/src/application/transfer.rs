//! TransferExecutor: what happens once the engine reports a finished transfer.
//!
//! The payload moves entirely inside the engine.  The client only has to
//! notice the engine's `success` and, on the receiving side, hand the payload
//! to the local vault importer.
//!
//! An import failure is its own failure kind ([`FailureKind::Import`]).  The
//! protocol worked; the data did not.  Repeating the pairing would deliver the
//! same bytes, so the session does not offer a retry for it.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info};
use vaultpair_core::{FailureKind, PairingFailure, PairingRole, PairingState, SessionId};

use crate::application::ports::{PairingEngine, VaultImporter};

/// Result of handling an engine `success` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Nothing left to do; the session succeeded.
    Completed,
    /// The payload is not available yet, or another call is importing it.
    /// Keep polling.
    Pending,
    /// The transfer or import failed.
    Failed(PairingFailure),
}

pub struct TransferExecutor {
    engine: Arc<dyn PairingEngine>,
    importer: Arc<dyn VaultImporter>,
    /// Session whose payload has been handed to the importer.
    claimed: Mutex<Option<SessionId>>,
}

impl TransferExecutor {
    pub fn new(engine: Arc<dyn PairingEngine>, importer: Arc<dyn VaultImporter>) -> Self {
        Self {
            engine,
            importer,
            claimed: Mutex::new(None),
        }
    }

    /// Handles the engine's `success` for `session`.
    ///
    /// A sender is done immediately.  A receiver fetches the payload and
    /// imports it; the importer runs at most once per session no matter how
    /// often this is called.
    pub async fn complete(&self, session: SessionId, role: PairingRole) -> TransferOutcome {
        if role == PairingRole::Sender {
            info!(%session, "vault delivered to peer");
            return TransferOutcome::Completed;
        }

        let payload = match self.engine.received_payload(session).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(%session, "payload not ready yet");
                return TransferOutcome::Pending;
            }
            Err(e) => {
                error!(%session, error = %e, "failed to fetch received payload");
                return TransferOutcome::Failed(e.into_failure(&PairingState::Transferring));
            }
        };

        if !self.try_claim(session) {
            debug!(%session, "payload already handed to importer");
            return TransferOutcome::Pending;
        }

        info!(%session, bytes = payload.len(), "importing received vault");
        match self.importer.import_vault(payload).await {
            Ok(()) => {
                info!(%session, "vault imported");
                TransferOutcome::Completed
            }
            Err(e) => {
                error!(%session, error = %e, "vault import failed");
                TransferOutcome::Failed(PairingFailure::new(
                    FailureKind::Import,
                    format!("The vault was received but could not be imported: {e}"),
                ))
            }
        }
    }

    fn try_claim(&self, session: SessionId) -> bool {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        if *claimed == Some(session) {
            return false;
        }
        *claimed = Some(session);
        true
    }
}
