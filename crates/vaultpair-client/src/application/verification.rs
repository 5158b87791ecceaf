//! VerificationGate: the human-in-the-loop step of pairing.
//!
//! Both devices show the code the engine derived from the key exchange, and a
//! person checks that they match before anything secret moves.  This is what
//! stops a nearby-but-wrong device from pairing.  The rules:
//!
//! - It never advances on its own.  Only [`VerificationGate::begin_confirm`]
//!   (user said "match") or a cancel moves past it.
//! - A confirmation, once sent, cannot be taken back or sent twice.
//! - The local confirmation alone proves nothing.  The session moves on only
//!   when the engine reports that *both* sides confirmed, and the gate treats
//!   an engine that claims progress before this device confirmed as a
//!   verification failure rather than something to go along with.

use thiserror::Error;
use vaultpair_core::{EngineStatus, VerificationCode};

/// Why a confirmation was refused.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("no verification code has been issued yet")]
    NoCode,
    #[error("this device has already confirmed the code")]
    AlreadyConfirmed,
}

/// What the session should do with an engine status, as far as the gate is
/// concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Still waiting for one or both confirmations.
    Hold,
    /// Both sides confirmed; the session may leave `Verifying`.
    Release,
    /// The engine moved past verification although this device never
    /// confirmed.
    Violation,
}

/// Per-session verification state.
#[derive(Debug, Default, Clone)]
pub struct VerificationGate {
    code: Option<VerificationCode>,
    confirmed: bool,
}

impl VerificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows `code`.  Re-presenting the same code is a no-op; a different code
    /// replaces it and clears nothing else.
    pub fn present(&mut self, code: VerificationCode) {
        self.code = Some(code);
    }

    pub fn code(&self) -> Option<&VerificationCode> {
        self.code.as_ref()
    }

    /// The code as one digit per box, or empty before a code exists.
    pub fn digits(&self) -> Vec<u8> {
        self.code.as_ref().map(|c| c.digits()).unwrap_or_default()
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Records the user's confirmation.  The caller then forwards it to the
    /// engine exactly once.
    ///
    /// # Errors
    ///
    /// [`GateError::NoCode`] before a code was shown, and
    /// [`GateError::AlreadyConfirmed`] on a second call.
    pub fn begin_confirm(&mut self) -> Result<(), GateError> {
        if self.code.is_none() {
            return Err(GateError::NoCode);
        }
        if self.confirmed {
            return Err(GateError::AlreadyConfirmed);
        }
        self.confirmed = true;
        Ok(())
    }

    /// Judges an engine status against the local confirmation.
    pub fn evaluate(&self, status: &EngineStatus) -> GateDecision {
        match (status.is_post_confirmation(), self.confirmed) {
            (false, _) => GateDecision::Hold,
            (true, true) => GateDecision::Release,
            (true, false) => GateDecision::Violation,
        }
    }
}
