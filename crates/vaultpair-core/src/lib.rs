//! # vaultpair-core
//!
//! Shared library for VaultPair containing the pairing domain model, the pure
//! pairing state machine, and the contract spoken with the external pairing
//! engine.
//!
//! This crate has zero dependencies on async runtimes, sockets, or UI
//! frameworks.  Everything in it can be unit-tested in isolation.
//!
//! # Architecture overview
//!
//! VaultPair moves the connection secret of an encrypted vault from one device
//! (the *sender*) to another (the *receiver*).  The cryptography, LAN transport
//! and storage live in a native engine that this workspace treats as an opaque
//! command surface.  What the client owns is the protocol state machine wrapped
//! around that engine:
//!
//! - **`domain`** – Peers, session identity, the [`PairingState`] sum type and
//!   the transition function that drives it, verification codes, and the
//!   opaque [`VaultTransferPayload`].
//!
//! - **`protocol`** – The engine's status report shape ([`EngineStatus`]), the
//!   structured engine error kinds, and the frame types used by the animated
//!   QR transport.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `vaultpair_core::PairingState` instead of the full module path.
pub use domain::payload::VaultTransferPayload;
pub use domain::peer::{dedup_peers, DiscoveredPeer};
pub use domain::session::{
    FailureKind, PairingFailure, PairingRole, PairingSession, PairingState, SessionId,
};
pub use domain::transition::{InvalidTransition, PairingEvent};
pub use domain::verification::{CodeError, VerificationCode};
pub use protocol::error::{EngineError, EngineErrorKind};
pub use protocol::qr::{frame_interval, ExportId, FramePoll, QrFrame};
pub use protocol::status::{EngineState, EngineStatus};
