//! Report encoding and decoding for the portal protocol.
//!
//! Every transfer is a fixed 32-byte HID report. Outbound commands:
//! ```text
//! ┌──────┬───────┬─────────┬────────┬──────────┬─────────┬──────────┬─────────┐
//! │ 0x00 │ magic │ 2 + len │ opcode │ sequence │ payload │ checksum │ 0-pad   │
//! └──────┴───────┴─────────┴────────┴──────────┴─────────┴──────────┴─────────┘
//! ```
//! Inbound replies start with the variant's reply id, events with reply id + 1:
//! ```text
//! reply: [reply_id, length, sequence, payload (length - 1 bytes), checksum]
//! event: [reply_id + 1, 0, event payload...]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FrameError;

/// Size of every HID report.
pub const REPORT_SIZE: usize = 32;

/// Header bytes ahead of the payload in an outbound report.
const COMMAND_HEADER: usize = 5;

/// Largest payload that fits in one outbound report.
pub const MAX_PAYLOAD: usize = REPORT_SIZE - COMMAND_HEADER - 1;

/// Low 8 bits of the sum of `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Builds an outbound command report.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload doesn't fit in one report.
pub fn encode(opcode: u8, payload: &[u8], sequence: u8, magic: u8) -> Result<Bytes, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::TooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }

    let mut buf = BytesMut::with_capacity(REPORT_SIZE);
    buf.put_u8(0x00);
    buf.put_u8(magic);
    // Length counts opcode and sequence plus the payload
    buf.put_u8(2 + payload.len() as u8);
    buf.put_u8(opcode);
    buf.put_u8(sequence);
    buf.put_slice(payload);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    buf.resize(REPORT_SIZE, 0);
    Ok(buf.freeze())
}

/// Builds an inbound reply report, as the device would send it.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload doesn't fit in one report.
pub fn encode_reply(reply_id: u8, sequence: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    let max = REPORT_SIZE - 4;
    if payload.len() > max {
        return Err(FrameError::TooLarge {
            size: payload.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(REPORT_SIZE);
    buf.put_u8(reply_id);
    buf.put_u8(1 + payload.len() as u8);
    buf.put_u8(sequence);
    buf.put_slice(payload);
    let sum = checksum(&buf);
    buf.put_u8(sum);
    buf.resize(REPORT_SIZE, 0);
    Ok(buf.freeze())
}

/// Builds an inbound event report, as the device would send it.
///
/// # Errors
///
/// Returns `FrameError::TooLarge` if the payload doesn't fit in one report.
pub fn encode_event(reply_id: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    let max = REPORT_SIZE - 2;
    if payload.len() > max {
        return Err(FrameError::TooLarge {
            size: payload.len(),
            max,
        });
    }

    let mut buf = BytesMut::with_capacity(REPORT_SIZE);
    buf.put_u8(reply_id.wrapping_add(1));
    buf.put_u8(0);
    buf.put_slice(payload);
    buf.resize(REPORT_SIZE, 0);
    Ok(buf.freeze())
}

/// A classified inbound report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// Reply to the request with the matching sequence number.
    Reply {
        sequence: u8,
        payload: Bytes,
        /// False if the trailing checksum didn't match.
        checksum_ok: bool,
    },
    /// Unsolicited event; payload layout is variant-specific.
    Event { payload: Bytes },
    /// Neither a reply nor an event for this variant.
    Unrecognized(Bytes),
}

/// Classifies an inbound report.
///
/// Returns `Ok(None)` for an empty read (no data within the timeout).
///
/// # Errors
///
/// Returns a `FrameError` if a reply is too short or its declared length
/// runs past the end of the report.
pub fn parse(report: &Bytes, reply_id: u8) -> Result<Option<Report>, FrameError> {
    let Some(&kind) = report.first() else {
        return Ok(None);
    };

    if kind == reply_id {
        if report.len() < 3 {
            return Err(FrameError::TooShort(report.len()));
        }
        let length = usize::from(report[1]);
        let end = 2 + length;
        if end > report.len() {
            return Err(FrameError::Incomplete {
                expected: end,
                got: report.len(),
            });
        }
        let sequence = report[2];
        let payload = if length == 0 {
            Bytes::new()
        } else {
            report.slice(3..end)
        };
        let checksum_ok = report
            .get(end)
            .is_some_and(|&sum| sum == checksum(&report[..end]));
        Ok(Some(Report::Reply {
            sequence,
            payload,
            checksum_ok,
        }))
    } else if kind == reply_id.wrapping_add(1) {
        let payload = report.slice(2.min(report.len())..);
        Ok(Some(Report::Event { payload }))
    } else {
        Ok(Some(Report::Unrecognized(report.clone())))
    }
}
