//! Infinity base family definition (VID 0x0e6f, PID 0x0129).
//!
//! Events carry no UID; it is fetched with a `TagInfo` request whose reply
//! is `[status, uid[7]]`. Block addresses use a sector/block split since the
//! base was built around Mifare Classic tags.

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::protocol::{CommandType, ErrorType};
use crate::types::{Tag, TagChangeEvent, Uid};
use crate::variant::{CommsDefinition, RequestSender};

/// Infinity base command table.
const COMMANDS: &[(CommandType, u8)] = &[
    (CommandType::Activate, 0x80),
    (CommandType::SeedRng, 0x81),
    (CommandType::GetRng, 0x83),
    (CommandType::SetOne, 0x90),
    (CommandType::GetOne, 0x91),
    (CommandType::FadeOne, 0x92),
    (CommandType::FlashOne, 0x93),
    (CommandType::RandomOne, 0x94),
    (CommandType::FadeAll, 0x96),
    (CommandType::FlashAll, 0x97),
    (CommandType::SetAll, 0x98),
    (CommandType::ListTags, 0xa1),
    (CommandType::ReadBlock, 0xa2),
    (CommandType::WriteBlock, 0xa3),
    (CommandType::TagInfo, 0xb4),
];

/// Infinity base definition.
pub static INFINITY: CommsDefinition = CommsDefinition {
    name: "infinity",
    activation: b"(c) Disney 2013",
    commands: COMMANDS,
    magic_prefix: 0xff,
    reply_id: 0xaa,
    vendor_id: 0x0e6f,
    product_id: 0x0129,
    has_nfc_sectors: true,
    ticks_per_second: 16,
    status_mask: 0xFF,
    prewarm_uid_cache: true,
    unpack_tag_event,
    fetch_tag_uid,
};

fn unpack_tag_event(data: &[u8]) -> Result<TagChangeEvent> {
    if data.len() < 4 {
        return Err(Error::Protocol {
            message: format!("tag event too short: {} bytes", data.len()),
        });
    }

    Ok(TagChangeEvent {
        tag: Tag::new(data[0], data[2], data[1]),
        is_removed: data[3] != 0,
    })
}

fn fetch_tag_uid<'a>(
    comms: &'a dyn RequestSender,
    tag: &'a Tag,
) -> BoxFuture<'a, Result<Option<Uid>>> {
    Box::pin(async move {
        let data = comms
            .send_message(CommandType::TagInfo, &[tag.index])
            .await?;

        match data.first() {
            Some(&status) if status == u8::from(ErrorType::NoSuchTag) => {
                Err(Error::TagNotFound { index: tag.index })
            }
            Some(_) => Uid::from_slice(&data[1..]).map(Some).ok_or_else(|| Error::Protocol {
                message: format!("tag info reply too short: {} bytes", data.len()),
            }),
            None => Err(Error::Protocol {
                message: "empty tag info reply".into(),
            }),
        }
    })
}
