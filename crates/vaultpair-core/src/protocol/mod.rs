//! Protocol module: the contract spoken with the external pairing engine.

pub mod error;
pub mod qr;
pub mod status;

pub use error::{EngineError, EngineErrorKind};
pub use qr::{frame_interval, ExportId, FramePoll, QrFrame};
pub use status::{EngineState, EngineStatus};
