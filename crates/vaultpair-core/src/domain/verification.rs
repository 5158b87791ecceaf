//! Verification codes.
//!
//! The engine derives a short numeric code from the key exchange; both devices
//! display it and a human compares them.  The client only checks that the code
//! is well formed for display.  It never derives or compares codes itself.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Shortest code the engine is expected to issue.
pub const MIN_CODE_DIGITS: usize = 4;

/// Longest code the engine is expected to issue.
pub const MAX_CODE_DIGITS: usize = 10;

/// Reasons an engine-supplied code cannot be displayed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodeError {
    #[error("verification code is empty")]
    Empty,
    #[error("verification code contains a non-digit character {0:?}")]
    NonDigit(char),
    #[error("verification code has {0} digits; expected {MIN_CODE_DIGITS}..={MAX_CODE_DIGITS}")]
    BadLength(usize),
}

/// A validated numeric verification code, e.g. `"482913"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VerificationCode(String);

impl VerificationCode {
    /// Parses the code string reported by the engine.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] if the code is empty, contains anything other than
    /// ASCII digits, or has an unexpected length.
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CodeError::Empty);
        }
        if let Some(bad) = trimmed.chars().find(|c| !c.is_ascii_digit()) {
            return Err(CodeError::NonDigit(bad));
        }
        let len = trimmed.len();
        if !(MIN_CODE_DIGITS..=MAX_CODE_DIGITS).contains(&len) {
            return Err(CodeError::BadLength(len));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The code as discrete digits, for rendering one box per digit.
    pub fn digits(&self) -> Vec<u8> {
        self.0.bytes().map(|b| b - b'0').collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for VerificationCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for VerificationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
