//! Frame types for the animated-QR export transport.
//!
//! When two devices cannot reach each other over the LAN, the sender plays the
//! secret as a looping sequence of QR codes that the receiver's camera reads.
//! The engine chunks and encodes the payload; the client only pulls frames and
//! puts them on screen at a steady rate.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default playback rate of the export animation.
pub const DEFAULT_FRAMES_PER_SECOND: u32 = 15;

/// Fastest playback rate accepted from configuration.
pub const MAX_FRAMES_PER_SECOND: u32 = 60;

/// Engine-assigned identity of one export session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(String);

impl ExportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A frame ready to be rendered as a QR code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrFrame {
    /// Zero-based count of frames played before this one in the session.
    pub sequence: u64,
    /// QR-encodable text for this frame.
    pub data: String,
}

/// Result of asking the engine for the next export frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePoll {
    /// Show this data next.
    Frame(String),
    /// The peer finished reading; stop the animation.
    Completed,
}

/// Time between two frames at `frames_per_second`.
///
/// The rate is clamped to `1..=MAX_FRAMES_PER_SECOND`.
pub fn frame_interval(frames_per_second: u32) -> Duration {
    let fps = frames_per_second.clamp(1, MAX_FRAMES_PER_SECOND);
    Duration::from_micros(1_000_000 / u64::from(fps))
}
