//! Application layer: the pairing and export use cases.
//!
//! # What is the "application" layer? (for beginners)
//!
//! In Clean Architecture the *application* layer sits between the domain
//! (pure rules in `vaultpair_core`) and the infrastructure (engine bindings,
//! config files, the UI bridge).
//!
//! Use cases in this layer:
//!
//! - **Orchestrate** domain objects to fulfil a user goal (e.g., "receive a
//!   vault from the laptop next to me").
//! - **Depend on abstractions** (the traits in [`ports`]) rather than concrete
//!   engines, so the native engine can be swapped for a test double.
//! - **Contain no platform calls**.  Everything external goes through a port.
//!
//! # Sub-modules
//!
//! - **`ports`** – Collaborator traits: pairing engine, vault importer,
//!   authenticator, QR export engine, frame renderer.
//!
//! - **`pairing_session`** – The session controller.  Owns the state, the
//!   pollers, the deadlines and the engine-side release.
//!
//! - **`discovery`** – Idempotent start/stop around the engine's LAN discovery
//!   and deduplicated peer polling.
//!
//! - **`verification`** – The confirmation gate between `Verifying` and
//!   `Transferring`.
//!
//! - **`transfer`** – Handles the engine's `success`: delivery on the sender,
//!   fetch-and-import on the receiver.
//!
//! - **`qr_export`** – The animated-QR fallback transport.
//!
//! - **`polling`** – Abort-on-drop task guards, interval loops and retry
//!   backoff shared by the controllers.

pub mod discovery;
pub mod pairing_session;
pub mod polling;
pub mod ports;
pub mod qr_export;
pub mod transfer;
pub mod verification;
