//! Protocol definitions for portal communication.
//!
//! This module contains the low-level protocol types including:
//! - Report encoding/decoding
//! - Family-agnostic command types
//! - Tag operation status codes

pub mod command;
pub mod frame;
pub mod status;

pub use command::CommandType;
pub use frame::{
    MAX_PAYLOAD, REPORT_SIZE, Report, checksum, encode as encode_frame, encode_event,
    encode_reply, parse as parse_report,
};
pub use status::{ErrorType, check_status};
