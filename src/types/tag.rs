//! Tag, platform and authentication types.

use std::fmt;

/// Length of a tag UID in bytes.
pub const UID_LEN: usize = 7;

/// Password length for custom tag authentication.
pub const PASSWORD_LEN: usize = 4;

/// A logical platform (pad) on the portal.
///
/// Families with more slots than the named ones use `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    /// Every platform at once.
    All,
    /// The centre platform.
    Center,
    /// Player one's platform.
    PlayerOne,
    /// Player two's platform.
    PlayerTwo,
    /// Any other platform code.
    Other(u8),
}

impl Platform {
    /// Converts a wire platform code.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Self::All,
            1 => Self::Center,
            2 => Self::PlayerOne,
            3 => Self::PlayerTwo,
            other => Self::Other(other),
        }
    }

    /// Returns the wire platform code.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::All => 0,
            Self::Center => 1,
            Self::PlayerOne => 2,
            Self::PlayerTwo => 3,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for Platform {
    fn from(byte: u8) -> Self {
        Self::from_byte(byte)
    }
}

impl From<Platform> for u8 {
    fn from(platform: Platform) -> Self {
        platform.as_byte()
    }
}

/// Tag password authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// No authentication.
    Off,
    /// The portal's default password scheme.
    Default,
    /// A caller-supplied password.
    Custom([u8; PASSWORD_LEN]),
}

impl AuthMode {
    /// Returns the wire mode code.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Default => 1,
            Self::Custom(_) => 2,
        }
    }
}

/// A tag's 7-byte hardware serial number.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uid([u8; UID_LEN]);

impl Uid {
    /// Creates a UID from bytes.
    #[must_use]
    pub const fn new(bytes: [u8; UID_LEN]) -> Self {
        Self(bytes)
    }

    /// Takes a UID from the first 7 bytes of a slice.
    ///
    /// Returns `None` if the slice is shorter than 7 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let uid = bytes.get(..UID_LEN)?;
        let mut out = [0u8; UID_LEN];
        out.copy_from_slice(uid);
        Some(Self(out))
    }

    /// Returns the UID as a byte slice.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the UID as a hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uid({})", self.to_hex())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A figure or disc currently on the portal.
///
/// The portal addresses tags by `index`, not by UID, and reuses indices
/// once a tag is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    /// Platform code the tag sits on.
    pub platform: u8,
    /// Per-portal tag index.
    pub index: u8,
    /// ISO 14443A select acknowledge byte.
    pub sak: u8,
    /// Hardware serial, once resolved.
    pub uid: Option<Uid>,
}

impl Tag {
    /// Creates a tag without a UID.
    #[must_use]
    pub const fn new(platform: u8, index: u8, sak: u8) -> Self {
        Self {
            platform,
            index,
            sak,
            uid: None,
        }
    }

    /// Decodes a 2-byte tag listing record: `[platform << 4 | index, sak]`.
    #[must_use]
    pub const fn from_record(record: [u8; 2]) -> Self {
        Self::new(record[0] >> 4, record[0] & 0x0F, record[1])
    }

    /// Returns the tag's platform.
    #[must_use]
    pub const fn platform(&self) -> Platform {
        Platform::from_byte(self.platform)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Tag(platform={},index={},sak={:#04x},uid=",
            self.platform, self.index, self.sak
        )?;
        match self.uid {
            Some(uid) => write!(f, "{uid})"),
            None => f.write_str("none)"),
        }
    }
}

/// A tag placed on or removed from the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagChangeEvent {
    /// The tag that changed.
    pub tag: Tag,
    /// True if the tag was removed, false if placed.
    pub is_removed: bool,
}
