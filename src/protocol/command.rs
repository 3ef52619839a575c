//! Command types for the portal protocol.
//!
//! Commands are family-agnostic; each variant maps them to its own opcode
//! byte through its command table. A command missing from the table is not
//! supported by that hardware.

/// Protocol operations understood by at least one portal family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Wake the portal with the activation string.
    Activate,
    /// Seed the portal's random number generator.
    SeedRng,
    /// Read from the portal's random number generator.
    GetRng,
    /// Set one platform's colour.
    SetOne,
    /// Get one platform's colour.
    GetOne,
    /// Fade one platform in and out.
    FadeOne,
    /// Flash one platform on and off.
    FlashOne,
    /// Fade one platform between random colours.
    RandomOne,
    /// Set every platform's colour.
    SetAll,
    /// Fade every platform.
    FadeAll,
    /// Flash every platform.
    FlashAll,
    /// List the tags currently on the portal.
    ListTags,
    /// Read a block from a tag.
    ReadBlock,
    /// Write a block to a tag.
    WriteBlock,
    /// Query a tag's info (including its UID).
    TagInfo,
    /// Configure tag password authentication.
    TagPassword,
    /// Enable or disable the NFC field.
    NfcOn,
    /// Keep-alive ping.
    Ping,
}
