//! The engine's pairing status report.
//!
//! Wire shape (JSON):
//!
//! ```json
//! {
//!   "state": "verifying",
//!   "verification_code": "482913",
//!   "connected_device": "Alice's Phone",
//!   "error": null,
//!   "error_kind": null
//! }
//! ```
//!
//! Only `state` is required.  Unknown fields are ignored so newer engines stay
//! readable.

use serde::{Deserialize, Serialize};

use crate::domain::verification::{CodeError, VerificationCode};
use crate::protocol::error::{EngineError, EngineErrorKind};

/// Session state as reported by the engine.
///
/// This is the engine's authoritative view; the client's own
/// [`crate::PairingState`] only advances when this says so.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    #[serde(alias = "advertising")]
    Listening,
    Connecting,
    Verifying,
    Transferring,
    #[serde(alias = "completed")]
    Success,
    Error,
    Cancelled,
}

/// One status report for a pairing session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: EngineState,
    #[serde(default)]
    pub verification_code: Option<String>,
    #[serde(default)]
    pub connected_device: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<EngineErrorKind>,
}

impl EngineStatus {
    /// A bare status with only a state, as most polls return.
    pub fn with_state(state: EngineState) -> Self {
        Self {
            state,
            verification_code: None,
            connected_device: None,
            error: None,
            error_kind: None,
        }
    }

    /// Decodes a JSON status report.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the report is malformed or the state
    /// is not recognised.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The verification code, validated for display.
    ///
    /// `Ok(None)` when the engine has not issued one yet.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] when the engine sent a malformed code.
    pub fn code(&self) -> Result<Option<VerificationCode>, CodeError> {
        self.verification_code
            .as_deref()
            .map(VerificationCode::parse)
            .transpose()
    }

    /// The failure this report describes, if any.
    ///
    /// `error` and `cancelled` states always produce an error even when the
    /// engine sent no message.  The structured `error_kind` is used when
    /// present; otherwise the kind is inferred from the message text.
    pub fn engine_error(&self) -> Option<EngineError> {
        match self.state {
            EngineState::Error => {
                let message = self
                    .error
                    .clone()
                    .unwrap_or_else(|| "the pairing engine reported an error".to_string());
                Some(match self.error_kind {
                    Some(kind) => EngineError::new(kind, message),
                    None => EngineError::from_message(message),
                })
            }
            EngineState::Cancelled => Some(EngineError::new(
                EngineErrorKind::Cancelled,
                self.error
                    .clone()
                    .unwrap_or_else(|| "the other device cancelled".to_string()),
            )),
            _ => None,
        }
    }

    /// Whether the engine has moved past verification, meaning both
    /// confirmations were registered on its side.
    pub fn is_post_confirmation(&self) -> bool {
        matches!(self.state, EngineState::Transferring | EngineState::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_status() {
        // Arrange
        let json = r#"{
            "state": "verifying",
            "verification_code": "482913",
            "connected_device": "Alice's Phone",
            "error": null
        }"#;

        // Act
        let status = EngineStatus::from_json(json).expect("decode");

        // Assert
        assert_eq!(status.state, EngineState::Verifying);
        assert_eq!(status.connected_device.as_deref(), Some("Alice's Phone"));
        let code = status.code().unwrap().unwrap();
        assert_eq!(code.digits().len(), 6);
    }

    #[test]
    fn test_decode_minimal_status() {
        let status = EngineStatus::from_json(r#"{"state":"listening"}"#).unwrap();
        assert_eq!(status, EngineStatus::with_state(EngineState::Listening));
    }

    #[test]
    fn test_decode_aliases() {
        let a = EngineStatus::from_json(r#"{"state":"advertising"}"#).unwrap();
        let b = EngineStatus::from_json(r#"{"state":"completed"}"#).unwrap();
        assert_eq!(a.state, EngineState::Listening);
        assert_eq!(b.state, EngineState::Success);
    }

    #[test]
    fn test_decode_unknown_state_fails() {
        assert!(EngineStatus::from_json(r#"{"state":"levitating"}"#).is_err());
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let status =
            EngineStatus::from_json(r#"{"state":"connecting","progress":0.4}"#).unwrap();
        assert_eq!(status.state, EngineState::Connecting);
    }

    #[test]
    fn test_code_absent_is_ok_none() {
        let status = EngineStatus::with_state(EngineState::Connecting);
        assert_eq!(status.code(), Ok(None));
    }

    #[test]
    fn test_malformed_code_is_reported() {
        let mut status = EngineStatus::with_state(EngineState::Verifying);
        status.verification_code = Some("12-34".to_string());
        assert!(status.code().is_err());
    }

    #[test]
    fn test_structured_error_kind_wins_over_text() {
        let mut status = EngineStatus::with_state(EngineState::Error);
        status.error = Some("address already in use".to_string());
        status.error_kind = Some(EngineErrorKind::Internal);
        assert_eq!(status.engine_error().unwrap().kind, EngineErrorKind::Internal);
    }

    #[test]
    fn test_unstructured_error_kind_is_inferred() {
        let mut status = EngineStatus::with_state(EngineState::Error);
        status.error = Some("address already in use".to_string());
        assert_eq!(
            status.engine_error().unwrap().kind,
            EngineErrorKind::ResourceBusy
        );
    }

    #[test]
    fn test_cancelled_state_is_an_error_without_message() {
        let status = EngineStatus::with_state(EngineState::Cancelled);
        let err = status.engine_error().unwrap();
        assert_eq!(err.kind, EngineErrorKind::Cancelled);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_non_error_states_have_no_error() {
        assert!(EngineStatus::with_state(EngineState::Transferring)
            .engine_error()
            .is_none());
    }

    #[test]
    fn test_post_confirmation_states() {
        assert!(!EngineStatus::with_state(EngineState::Verifying).is_post_confirmation());
        assert!(EngineStatus::with_state(EngineState::Transferring).is_post_confirmation());
        assert!(EngineStatus::with_state(EngineState::Success).is_post_confirmation());
    }
}
