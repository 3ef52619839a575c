//! # toyportal
//!
//! A Rust driver for toy NFC portals that attach over USB HID.
//!
//! Two portal families are supported. They share one request/reply protocol
//! and differ in opcodes, framing constants, addressing and timing, which are
//! captured in a [`CommsDefinition`].
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Concurrent requests matched to replies by sequence number
//! - Tag placement and removal notifications with UID caching
//! - Per-family command tables
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use toyportal::{Color, DIMENSIONS, Platform, Portal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), toyportal::Error> {
//!     let portal = Portal::open(&DIMENSIONS, None)?;
//!     portal
//!         .on_tags_changed(|event| async move {
//!             println!("{} removed={}", event.tag, event.is_removed);
//!         })
//!         .await;
//!     portal.connect().await?;
//!
//!     portal.set_color(Platform::Center, Color::new(0, 0, 255)).await?;
//!     portal
//!         .fade_color(Platform::PlayerOne, Color::new(255, 0, 0), Duration::from_secs(1), 2)
//!         .await?;
//!
//!     for (platform, tags) in portal.get_all_tags().await? {
//!         println!("platform {platform}: {tags:?}");
//!     }
//!
//!     portal.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Wire codec, command set and status codes
//! - [`types`] - Tags, UIDs, colours and auth modes
//! - [`variant`] - Per-family definitions
//! - [`transport`] - HID report transport
//! - [`comms`] - Request/reply session and event routing
//! - [`event`] - Tag change observers and subscriptions
//! - [`portal`] - High-level [`Portal`] client

pub mod comms;
pub mod error;
pub mod event;
pub mod portal;
pub mod protocol;
pub mod transport;
pub mod types;
pub mod variant;

// Re-exports for convenience
pub use comms::{Comms, CommsConfig};
pub use error::{Error, FrameError, Result};
pub use event::{Subscription, TagCallback, TagObserver};
pub use portal::{Portal, PortalState};
pub use protocol::{CommandType, ErrorType};
pub use transport::Transport;
#[cfg(feature = "hid")]
pub use transport::{HidTransport, list_devices};
pub use types::{AuthMode, Color, Platform, Tag, TagChangeEvent, Uid};
pub use variant::{CommsDefinition, DIMENSIONS, INFINITY};
