//! Status codes reported in the first byte of tag I/O replies.

use std::fmt;

use crate::error::{Error, Result};

/// Status codes the portal reports for tag operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorType {
    /// Operation succeeded.
    Success = 0x00,
    /// Requested a tag index that isn't on the portal.
    NoSuchTag = 0x80,
    /// General tag failure, e.g. auth failure or tag removed mid-transfer.
    TagIoError = 0x82,
    /// Tag requires an authentication method the portal doesn't support.
    TagAuthUnsupported = 0x83,
}

impl ErrorType {
    /// Converts a byte to a status, if known.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Success),
            0x80 => Some(Self::NoSuchTag),
            0x82 => Some(Self::TagIoError),
            0x83 => Some(Self::TagAuthUnsupported),
            _ => None,
        }
    }

    /// Human-readable description.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::NoSuchTag => "No such tag",
            Self::TagIoError => "Tag I/O error",
            Self::TagAuthUnsupported => "Tag auth unsupported",
        }
    }
}

impl From<ErrorType> for u8 {
    fn from(status: ErrorType) -> Self {
        status as Self
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Checks a reply status byte.
///
/// Bits outside `mask` are ignored; one family sets upper bits the other
/// leaves clear.
pub fn check_status(code: u8, mask: u8) -> Result<()> {
    match ErrorType::from_byte(code & mask) {
        Some(ErrorType::Success) => Ok(()),
        Some(status) => Err(Error::Status(status)),
        None => Err(Error::UnknownStatus { code: code & mask }),
    }
}
