//! Domain entities for VaultPair.
//!
//! Pure business rules with no infrastructure dependencies.  The application
//! layer in `vaultpair-client` orchestrates these types; it never reaches past
//! them into engine internals.

/// Peers reported by LAN discovery.
pub mod peer;

/// Session identity, roles, states and the observable session snapshot.
pub mod session;

/// The pairing state machine's transition function.
pub mod transition;

/// Short numeric codes shown on both devices during verification.
pub mod verification;

/// The opaque vault credential blob moved by a pairing.
pub mod payload;
