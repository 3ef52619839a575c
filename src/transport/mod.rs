//! Transport layer for portal communication.
//!
//! This module provides the abstraction over the raw HID report primitive.
//! Calls are blocking; the session runs them on tokio's blocking pool.

#[cfg(feature = "hid")]
pub mod hid;
#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Trait for fixed-size report transports.
///
/// Reads and writes may be issued concurrently from different threads.
pub trait Transport: Send + Sync + 'static {
    /// Writes one report to the device.
    fn write_report(&self, report: &[u8]) -> Result<()>;

    /// Reads one report, waiting at most `timeout`.
    ///
    /// Returns an empty buffer if nothing arrived in time.
    fn read_report(&self, timeout: Duration) -> Result<Bytes>;
}

#[cfg(feature = "hid")]
pub use hid::{HidTransport, list_devices};
