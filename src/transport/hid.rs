//! USB HID transport implementation.
//!
//! This module provides report-level access to portals through `hidapi`.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use bytes::Bytes;
use hidapi::{HidApi, HidDevice};

use crate::error::{Error, Result};
use crate::protocol::REPORT_SIZE;
use crate::transport::Transport;

/// Longest single read while the device lock is held.
///
/// Longer reads are split so writers don't wait out a whole poll.
const READ_SLICE: Duration = Duration::from_millis(10);

/// HID transport for a single portal.
pub struct HidTransport {
    device: Mutex<HidDevice>,
    serial: Option<String>,
}

impl HidTransport {
    /// Opens a device by VID/PID, optionally picking one by serial number.
    pub fn open(vendor_id: u16, product_id: u16, serial: Option<&str>) -> Result<Self> {
        let api = HidApi::new()?;
        let device = match serial {
            Some(serial) => api.open_serial(vendor_id, product_id, serial)?,
            None => api.open(vendor_id, product_id)?,
        };
        device.set_blocking_mode(true)?;

        let serial = device.get_serial_number_string().ok().flatten();
        tracing::info!(
            "opened HID device {vendor_id:04x}:{product_id:04x} serial={}",
            serial.as_deref().unwrap_or("?")
        );

        Ok(Self {
            device: Mutex::new(device),
            serial,
        })
    }

    /// Serial number reported by the device, if any.
    #[must_use]
    pub fn serial(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    fn device(&self) -> Result<MutexGuard<'_, HidDevice>> {
        self.device.lock().map_err(|_| {
            Error::Io(std::io::Error::other("HID device lock poisoned"))
        })
    }
}

impl Transport for HidTransport {
    fn write_report(&self, report: &[u8]) -> Result<()> {
        let device = self.device()?;
        device.write(report)?;
        Ok(())
    }

    fn read_report(&self, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut buf = [0u8; REPORT_SIZE];

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let slice = remaining.min(READ_SLICE);
            let millis = i32::try_from(slice.as_millis()).unwrap_or(i32::MAX);

            let n = {
                let device = self.device()?;
                device.read_timeout(&mut buf, millis)?
            };
            if n > 0 {
                return Ok(Bytes::copy_from_slice(&buf[..n]));
            }
            if remaining <= READ_SLICE {
                return Ok(Bytes::new());
            }
        }
    }
}

/// Lists serial numbers of attached devices matching VID/PID.
///
/// Devices without a serial number are reported as empty strings.
pub fn list_devices(vendor_id: u16, product_id: u16) -> Result<Vec<String>> {
    let api = HidApi::new()?;
    Ok(api
        .device_list()
        .filter(|info| info.vendor_id() == vendor_id && info.product_id() == product_id)
        .map(|info| info.serial_number().unwrap_or_default().to_string())
        .collect())
}
