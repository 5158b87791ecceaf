//! VaultPair headless client entry point.
//!
//! Runs one receiver pairing against the simulated engine: waits for the
//! peer, prints the verification digits, asks the operator to compare them,
//! and reports how the session ended.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- platform config file, defaults on error
//!  └─ AppState::new()         -- controllers over simulated collaborators
//!  └─ start_pair_device
//!       ├─ snapshot watcher   (prints state changes, prompts on Verifying)
//!       └─ Ctrl-C handler     (cancels the session)
//! ```

use std::io::BufRead;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vaultpair_client::infrastructure::storage::config::{load_config, AppConfig};
use vaultpair_client::infrastructure::ui_bridge::{
    cancel_pairing, close_pairing, confirm_pairing, start_pair_device, AppState, Collaborators,
};
use vaultpair_core::PairingState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("warning: {e}; using default configuration");
            AppConfig::default()
        }
    };

    // Initialise structured logging.  `RUST_LOG` overrides the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.device.log_level)),
        )
        .init();

    let state = AppState::new(config, Collaborators::simulated());
    {
        let cfg = state.config.lock().await;
        info!(device = %cfg.device.name, "VaultPair client starting");
    }
    let mut updates = state.pairing.subscribe();

    let started = start_pair_device(Arc::clone(&state)).await;
    if !started.success {
        anyhow::bail!(
            "could not start pairing: {}",
            started.error.unwrap_or_default()
        );
    }
    println!("Waiting for a device to connect. Press Ctrl-C to cancel.");

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let cancel_state = Arc::clone(&state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; cancelling pairing");
            cancel_pairing(cancel_state).await;
        }
    });

    let mut prompted = false;
    let outcome = loop {
        updates
            .changed()
            .await
            .context("pairing controller went away")?;
        let session = updates.borrow_and_update().clone();
        info!(state = session.state.name(), "pairing update");

        match &session.state {
            PairingState::Connecting => {
                if let Some(peer) = &session.peer_name {
                    println!("Connecting to {peer}...");
                }
            }
            PairingState::Verifying if !prompted => {
                prompted = true;
                let code = session
                    .verification_code
                    .as_ref()
                    .map(|c| c.as_str().to_string())
                    .unwrap_or_default();
                println!("Verification code: {code}");
                println!("Does the other device show the same code? [y/N]");
                if read_yes().await? {
                    let res = confirm_pairing(Arc::clone(&state)).await;
                    if !res.success {
                        warn!(error = ?res.error, "confirmation refused");
                    }
                } else {
                    cancel_pairing(Arc::clone(&state)).await;
                }
            }
            PairingState::Transferring => println!("Receiving vault..."),
            PairingState::Success | PairingState::Error(_) | PairingState::Idle => {
                break session.state.clone();
            }
            _ => {}
        }
    };

    match &outcome {
        PairingState::Success => println!("Vault received and imported."),
        PairingState::Error(failure) => println!("Pairing failed: {failure}"),
        _ => println!("Pairing cancelled."),
    }
    close_pairing(Arc::clone(&state)).await;

    info!("VaultPair client stopped");
    Ok(())
}

/// Reads one line from stdin without blocking the runtime.
async fn read_yes() -> anyhow::Result<bool> {
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await
    .context("stdin reader panicked")?
    .context("failed to read from stdin")?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}
