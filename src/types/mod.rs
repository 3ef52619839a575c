//! Data types for portal entities.
//!
//! This module contains the core data structures used throughout the library:
//! - Platform colours
//! - Tags, UIDs and change events
//! - Platforms and authentication modes

pub mod color;
pub mod tag;

pub use color::Color;
pub use tag::{AuthMode, PASSWORD_LEN, Platform, Tag, TagChangeEvent, UID_LEN, Uid};
