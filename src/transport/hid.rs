//! hidapi-backed transport.
//!
//! hidapi reads block, so every transfer runs on the caller's thread (the
//! polling worker when polling) and never on an async runtime.

use std::collections::HashSet;
use std::time::Duration;

use hidapi::{BusType, HidApi, HidDevice};
use tracing::{debug, info, warn};

use super::{Bus, DeviceDescriptor, Transfer, Transport, TransportError};
use crate::controller::DualSense;
use crate::error::{Error, Result};
use crate::mode::{BT_REPORT_SIZE, USB_READ_SIZE, USB_WRITE_SIZE};

pub const VENDOR_ID: u16 = 0x054C;
pub const PRODUCT_ID: u16 = 0x0CE6;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_OPEN_RETRIES: u32 = 5;
const OPEN_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Report sizes implied by the bus the controller is attached through.
fn report_sizes(bus: Bus) -> (usize, usize) {
    match bus {
        Bus::Usb => (USB_READ_SIZE, USB_WRITE_SIZE),
        Bus::Bluetooth => (BT_REPORT_SIZE, BT_REPORT_SIZE),
        Bus::Other => (0, 0),
    }
}

/// List attached DualSense controllers, one entry per device path.
pub fn list_devices(api: &HidApi) -> Vec<DeviceDescriptor> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for info in api.device_list() {
        if info.vendor_id() != VENDOR_ID || info.product_id() != PRODUCT_ID {
            continue;
        }
        // hidapi reports one entry per usage page; they share a path.
        if !seen.insert(info.path().to_owned()) {
            continue;
        }
        let bus = match info.bus_type() {
            BusType::Usb => Bus::Usb,
            BusType::Bluetooth => Bus::Bluetooth,
            _ => Bus::Other,
        };
        let (read_buffer_size, write_buffer_size) = report_sizes(bus);
        debug!(
            "[HID] Found {:04X}:{:04X} at {:?} ({bus:?})",
            VENDOR_ID,
            PRODUCT_ID,
            info.path()
        );
        out.push(DeviceDescriptor {
            read_buffer_size,
            write_buffer_size,
            path: info.path().to_owned(),
            bus,
            serial_number: info.serial_number().map(str::to_owned),
            product: info.product_string().map(str::to_owned),
        });
    }
    out
}

/// Build a controller for every attached DualSense. Devices on an
/// unrecognised bus are skipped.
pub fn enumerate_controllers() -> Result<Vec<DualSense<HidTransport>>> {
    let api = HidApi::new().map_err(TransportError::from)?;
    let mut controllers = Vec::new();
    for desc in list_devices(&api) {
        let path = desc.path.clone();
        match DualSense::from_descriptor(desc) {
            Ok(ds) => controllers.push(ds),
            Err(Error::UnsupportedIoMode { read_buffer_size }) => {
                warn!("[HID] Skipping {path:?}: unsupported read buffer size {read_buffer_size}");
            }
            Err(e) => return Err(e),
        }
    }
    info!("[HID] {} controller(s) available", controllers.len());
    Ok(controllers)
}

pub struct HidTransport {
    descriptor: DeviceDescriptor,
    device: Option<HidDevice>,
    read_timeout: Duration,
    open_retries: u32,
}

impl HidTransport {
    pub fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            device: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            open_retries: DEFAULT_OPEN_RETRIES,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Number of open attempts before giving up (at least one).
    pub fn with_open_retries(mut self, retries: u32) -> Self {
        self.open_retries = retries.max(1);
        self
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }
}

impl Transport for HidTransport {
    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn open(&mut self) -> Result<(), TransportError> {
        if self.device.is_some() {
            return Ok(());
        }
        info!("[HID] Opening {:?}...", self.descriptor.path);
        let api = HidApi::new_without_enumerate()?;

        // The kernel driver may take a moment to appear after plug-in.
        let mut attempt = 1;
        let device = loop {
            match api.open_path(&self.descriptor.path) {
                Ok(d) => break d,
                Err(e) if attempt < self.open_retries => {
                    warn!(
                        "[HID] Attempt {attempt}/{} failed: {e}, retrying...",
                        self.open_retries
                    );
                    std::thread::sleep(OPEN_RETRY_DELAY);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        device.set_blocking_mode(true)?;

        info!("[HID] Device opened ({:?})", self.descriptor.bus);
        self.device = Some(device);
        Ok(())
    }

    fn close(&mut self) {
        if self.device.take().is_some() {
            info!("[HID] Device closed");
        }
    }

    fn transfer(&mut self, frame: &[u8]) -> Result<Transfer, TransportError> {
        let device = self.device.as_ref().ok_or(TransportError::NotOpen)?;

        device.write(frame)?;

        let mut data = vec![0u8; self.descriptor.read_buffer_size];
        let timeout_ms = i32::try_from(self.read_timeout.as_millis()).unwrap_or(i32::MAX);
        let n = device.read_timeout(&mut data, timeout_ms)?;
        if n == 0 {
            return Err(TransportError::Timeout(self.read_timeout));
        }
        Ok(Transfer {
            bytes_transferred: n,
            data,
        })
    }
}

impl DualSense<HidTransport> {
    /// Wrap an enumerated device. Fails if its I/O mode is unknown.
    pub fn from_descriptor(descriptor: DeviceDescriptor) -> Result<Self> {
        let (read, write) = (descriptor.read_buffer_size, descriptor.write_buffer_size);
        DualSense::new(HidTransport::new(descriptor), read, write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::IoMode;

    #[test]
    fn test_report_sizes_by_bus() {
        assert_eq!(report_sizes(Bus::Usb), (64, 48));
        assert_eq!(report_sizes(Bus::Bluetooth), (78, 78));
        assert_eq!(report_sizes(Bus::Other), (0, 0));
    }

    fn descriptor(bus: Bus) -> DeviceDescriptor {
        let (read_buffer_size, write_buffer_size) = report_sizes(bus);
        DeviceDescriptor {
            read_buffer_size,
            write_buffer_size,
            path: std::ffi::CString::new("/dev/hidraw9").unwrap(),
            bus,
            serial_number: None,
            product: Some("DualSense Wireless Controller".into()),
        }
    }

    #[test]
    fn test_from_descriptor_rejects_unknown_bus() {
        assert!(matches!(
            DualSense::from_descriptor(descriptor(Bus::Other)),
            Err(Error::UnsupportedIoMode { read_buffer_size: 0 })
        ));
    }

    #[test]
    fn test_from_descriptor_picks_mode() {
        let ds = DualSense::from_descriptor(descriptor(Bus::Bluetooth)).unwrap();
        assert_eq!(ds.io_mode(), IoMode::Bluetooth);
        assert!(!ds.is_open());
    }

    #[test]
    fn test_transfer_requires_open() {
        let mut t = HidTransport::new(descriptor(Bus::Usb));
        assert!(matches!(t.transfer(&[0x02]), Err(TransportError::NotOpen)));
    }

    #[test]
    fn test_builder_settings() {
        let t = HidTransport::new(descriptor(Bus::Usb))
            .with_read_timeout(Duration::from_millis(250))
            .with_open_retries(0);
        assert_eq!(t.read_timeout, Duration::from_millis(250));
        assert_eq!(t.open_retries, 1);
    }
}
