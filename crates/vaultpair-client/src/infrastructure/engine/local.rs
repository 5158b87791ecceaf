//! Device-local collaborators for the headless client.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{info, warn};
use vaultpair_core::{QrFrame, VaultTransferPayload};

use crate::application::ports::{
    AuthError, Authenticator, FrameRenderer, ImportError, VaultImporter,
};

/// Keeps imported vault blobs in memory.
///
/// Rejects empty payloads and a second import of an identical blob.
#[derive(Default)]
pub struct InMemoryVaultStore {
    vaults: Mutex<Vec<String>>,
}

impl InMemoryVaultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vault_count(&self) -> usize {
        self.vaults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl VaultImporter for InMemoryVaultStore {
    async fn import_vault(&self, payload: VaultTransferPayload) -> Result<(), ImportError> {
        if payload.is_empty() {
            return Err(ImportError::InvalidPayload("payload is empty".to_string()));
        }
        let mut vaults = self.vaults.lock().unwrap_or_else(PoisonError::into_inner);
        if vaults.iter().any(|v| v == payload.expose()) {
            return Err(ImportError::AlreadyExists);
        }
        vaults.push(payload.expose().to_string());
        info!(bytes = payload.len(), "vault imported");
        Ok(())
    }
}

/// Stands in for a biometric prompt: the operator of the headless binary is
/// treated as present.
pub struct PresenceAuthenticator {
    present: bool,
}

impl PresenceAuthenticator {
    pub fn new(present: bool) -> Self {
        Self { present }
    }
}

#[async_trait]
impl Authenticator for PresenceAuthenticator {
    async fn authenticate(&self, reason: &str) -> Result<(), AuthError> {
        if self.present {
            info!(reason, "user presence assumed");
            Ok(())
        } else {
            warn!(reason, "no authenticator available");
            Err(AuthError::Unavailable)
        }
    }
}

/// Writes each frame to the log instead of drawing it.
#[derive(Default)]
pub struct LoggingFrameRenderer;

impl FrameRenderer for LoggingFrameRenderer {
    fn render_frame(&self, frame: &QrFrame) {
        info!(sequence = frame.sequence, chars = frame.data.len(), "qr frame");
    }
}
