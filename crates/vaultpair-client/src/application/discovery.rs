//! DiscoveryClient: LAN advertisement and scanning lifecycle.
//!
//! Wraps the engine's discovery commands with the guarantees the session
//! controller relies on:
//!
//! - `start` surfaces failures immediately so the session can abort before any
//!   peer list is shown.
//! - `stop` is idempotent.  A second call, or a call for a session that never
//!   started discovery, makes no engine call and returns nothing to handle.
//! - `poll` never fails.  Engine errors are logged and yield an empty list, and
//!   duplicate reports of one peer are collapsed by id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use vaultpair_core::{dedup_peers, DiscoveredPeer, EngineError, SessionId};

use crate::application::ports::PairingEngine;

pub struct DiscoveryClient {
    engine: Arc<dyn PairingEngine>,
    /// Sessions whose discovery is running.  A new session can start before
    /// the previous one's stop has gone out, so there may be more than one.
    active: Mutex<HashSet<SessionId>>,
}

impl DiscoveryClient {
    pub fn new(engine: Arc<dyn PairingEngine>) -> Self {
        Self {
            engine,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Starts advertising and scanning for `session`.
    ///
    /// # Errors
    ///
    /// Returns the engine's error when discovery could not start.
    pub async fn start(&self, session: SessionId) -> Result<(), EngineError> {
        self.engine.start_discovery(session).await?;
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session);
        info!(%session, "discovery started");
        Ok(())
    }

    /// Stops discovery for `session` if it is running.
    ///
    /// Failures are logged only; callers tear down regardless.
    pub async fn stop(&self, session: SessionId) {
        let was_running = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session);
        if !was_running {
            debug!(%session, "discovery not running; stop skipped");
            return;
        }
        match self.engine.stop_discovery(session).await {
            Ok(()) => info!(%session, "discovery stopped"),
            Err(e) => warn!(%session, error = %e, "failed to stop discovery"),
        }
    }

    /// Whether discovery is running for `session`.
    pub fn is_running(&self, session: SessionId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&session)
    }

    /// Current peers for `session`, deduplicated by id.
    pub async fn poll(&self, session: SessionId) -> Vec<DiscoveredPeer> {
        match self.engine.list_peers(session).await {
            Ok(peers) => {
                let peers = dedup_peers(peers);
                debug!(%session, count = peers.len(), "polled peers");
                peers
            }
            Err(e) => {
                warn!(%session, error = %e, "peer poll failed; treating as empty");
                Vec::new()
            }
        }
    }
}
