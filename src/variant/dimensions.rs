//! Toy pad family definition (VID 0x0e6f, PID 0x0241).
//!
//! Events carry the tag UID inline, so no follow-up command is needed.
//! Event payload: `[platform, sak, index, removed, uid[7]]`.

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::protocol::CommandType;
use crate::types::{Tag, TagChangeEvent, Uid};
use crate::variant::{CommsDefinition, RequestSender};

/// Toy pad command table.
const COMMANDS: &[(CommandType, u8)] = &[
    (CommandType::Activate, 0xb0),
    (CommandType::SeedRng, 0xb1),
    (CommandType::GetRng, 0xb3),
    (CommandType::SetOne, 0xc0),
    (CommandType::GetOne, 0xc1),
    (CommandType::FadeOne, 0xc2),
    (CommandType::FlashOne, 0xc3),
    (CommandType::RandomOne, 0xc4),
    (CommandType::FadeAll, 0xc6),
    (CommandType::FlashAll, 0xc7),
    (CommandType::SetAll, 0xc8),
    (CommandType::ListTags, 0xd0),
    (CommandType::ReadBlock, 0xd2),
    (CommandType::WriteBlock, 0xd3),
    (CommandType::TagPassword, 0xe1),
    (CommandType::NfcOn, 0xe5),
];

/// Toy pad definition.
pub static DIMENSIONS: CommsDefinition = CommsDefinition {
    name: "dimensions",
    activation: b"(c) LEGO 2014",
    commands: COMMANDS,
    magic_prefix: 0x55,
    reply_id: 0x55,
    vendor_id: 0x0e6f,
    product_id: 0x0241,
    has_nfc_sectors: false,
    ticks_per_second: 32,
    status_mask: 0x8F,
    prewarm_uid_cache: false,
    unpack_tag_event,
    fetch_tag_uid,
};

fn unpack_tag_event(data: &[u8]) -> Result<TagChangeEvent> {
    if data.len() < 11 {
        return Err(Error::Protocol {
            message: format!("tag event too short: {} bytes", data.len()),
        });
    }

    let tag = Tag {
        platform: data[0],
        index: data[2],
        sak: data[1],
        uid: Uid::from_slice(&data[4..11]),
    };
    Ok(TagChangeEvent {
        tag,
        is_removed: data[3] != 0,
    })
}

fn fetch_tag_uid<'a>(
    _comms: &'a dyn RequestSender,
    _tag: &'a Tag,
) -> BoxFuture<'a, Result<Option<Uid>>> {
    // UIDs only ever arrive inside events
    Box::pin(async { Ok(None) })
}
