//! Engine adapters.
//!
//! The real pairing engine is a native component outside this crate.  This
//! module provides in-process stand-ins that implement the application ports
//! so the headless binary and the UI bridge can run without one.
//!
//! # Module layout
//!
//! - `simulated` – [`SimulatedEngine`] and [`SimulatedQrEngine`], scripted
//!   by elapsed time
//! - `local` – the device-local collaborators: importer, authenticator, and a
//!   frame renderer that logs frames

pub mod local;
pub mod simulated;

pub use local::{InMemoryVaultStore, LoggingFrameRenderer, PresenceAuthenticator};
pub use simulated::{SimulatedEngine, SimulatedQrEngine, SimulationScript};
