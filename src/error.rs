//! Error types for the toyportal library.

use thiserror::Error;

use crate::portal::PortalState;
use crate::protocol::{CommandType, ErrorType};

/// The main error type for toyportal operations.
#[derive(Debug, Error)]
pub enum Error {
    /// USB HID error.
    #[cfg(feature = "hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The active variant has no opcode for this command.
    #[error("unsupported command: {0:?}")]
    UnsupportedCommand(CommandType),

    /// The device reported a known non-success status.
    #[error("device status: {0}")]
    Status(ErrorType),

    /// The device reported a status code we don't recognize.
    #[error("unknown error: {code:#04x}")]
    UnknownStatus { code: u8 },

    /// No tag is present at the given index.
    #[error("no such tag at index {index}")]
    TagNotFound { index: u8 },

    /// Malformed reply or event payload.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// Command timed out waiting for response.
    #[error("command timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// Operation is not valid in the portal's current state.
    #[error("invalid portal state: {state:?}")]
    InvalidState { state: PortalState },

    /// Pending request was abandoned before a reply arrived.
    #[error("channel closed")]
    ChannelClosed,

    /// A blocking device call panicked or was cancelled.
    #[error("task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Frame-specific errors.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Report too short to contain the reply header.
    #[error("report too short: need at least 3 bytes, got {0}")]
    TooShort(usize),

    /// Payload does not fit in a single report.
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    /// Declared length runs past the end of the report.
    #[error("incomplete frame: expected {expected} bytes, got {got}")]
    Incomplete { expected: usize, got: usize },
}

/// Result type alias for toyportal operations.
pub type Result<T> = std::result::Result<T, Error>;
