//! Infrastructure layer for the VaultPair client.
//!
//! Contains the outward-facing adapters: the simulated engine used by the
//! headless binary, file-system configuration storage, and the UI command
//! bridge.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `vaultpair_core`, but MUST NOT be imported by the `application` or domain
//! layers.

pub mod engine;
pub mod storage;
pub mod ui_bridge;
