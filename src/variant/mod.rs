//! Per-family portal definitions.
//!
//! Both portal families speak the same protocol skeleton. A
//! [`CommsDefinition`] captures everything that differs between them: the
//! command table, magic byte, reply id, activation string, addressing, timing
//! and two hooks for decoding events and fetching tag UIDs.

pub mod dimensions;
pub mod infinity;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::protocol::CommandType;
use crate::types::{Tag, TagChangeEvent, Uid};

pub use dimensions::DIMENSIONS;
pub use infinity::INFINITY;

/// Capability to send a command and await its reply payload.
///
/// Handed to [`UidFetcher`] hooks so a family can issue follow-up requests.
pub trait RequestSender: Send + Sync {
    /// Sends a command and returns the reply payload.
    fn send_message<'a>(
        &'a self,
        command: CommandType,
        data: &'a [u8],
    ) -> BoxFuture<'a, Result<Bytes>>;
}

/// Decodes an event payload into a tag change.
pub type EventDecoder = fn(&[u8]) -> Result<TagChangeEvent>;

/// Fetches the UID for a tag index.
///
/// Returns `Ok(None)` when the family has no way to obtain it and
/// `Err(Error::TagNotFound)` when the portal reports the tag absent.
pub type UidFetcher =
    for<'a> fn(&'a dyn RequestSender, &'a Tag) -> BoxFuture<'a, Result<Option<Uid>>>;

/// Static configuration for one portal family.
pub struct CommsDefinition {
    /// Family name, for logs.
    pub name: &'static str,
    /// Payload sent with the activate command.
    pub activation: &'static [u8],
    /// Supported commands and their opcodes.
    pub commands: &'static [(CommandType, u8)],
    /// Byte marking the start of an outbound command.
    pub magic_prefix: u8,
    /// First byte of a reply; events use this plus one.
    pub reply_id: u8,
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
    /// Whether block addresses are split into sector and block.
    pub has_nfc_sectors: bool,
    /// Duration ticks per second.
    pub ticks_per_second: u32,
    /// Bits of a status byte that carry meaning.
    pub status_mask: u8,
    /// Whether `connect` lists tags to warm the UID cache.
    pub prewarm_uid_cache: bool,
    /// Event payload decoder.
    pub unpack_tag_event: EventDecoder,
    /// UID lookup hook.
    pub fetch_tag_uid: UidFetcher,
}

impl CommsDefinition {
    /// Returns the opcode for a command, if this family supports it.
    #[must_use]
    pub fn opcode(&self, command: CommandType) -> Option<u8> {
        self.commands
            .iter()
            .find(|(cmd, _)| *cmd == command)
            .map(|&(_, opcode)| opcode)
    }

    /// Returns true if this family supports the command.
    #[must_use]
    pub fn supports(&self, command: CommandType) -> bool {
        self.opcode(command).is_some()
    }

    /// Converts a duration into this family's tick units, saturating at 255.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub fn ticks(&self, duration: Duration) -> u8 {
        (duration.as_secs_f64() * f64::from(self.ticks_per_second)) as u8
    }

    /// Splits a block number into the wire's addressing bytes.
    #[must_use]
    pub fn block_address(&self, block: u8) -> Vec<u8> {
        if self.has_nfc_sectors {
            vec![block / 4, block % 4]
        } else {
            vec![block]
        }
    }
}

impl fmt::Debug for CommsDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommsDefinition")
            .field("name", &self.name)
            .field("magic_prefix", &self.magic_prefix)
            .field("reply_id", &self.reply_id)
            .field("vendor_id", &self.vendor_id)
            .field("product_id", &self.product_id)
            .field("has_nfc_sectors", &self.has_nfc_sectors)
            .field("ticks_per_second", &self.ticks_per_second)
            .finish_non_exhaustive()
    }
}
