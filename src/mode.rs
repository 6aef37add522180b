//! Connection kind, derived once from the device's declared read buffer size.

use std::fmt;

use serde::Serialize;

/// Input report size over USB (report ID 0x01 + 63 bytes).
pub const USB_READ_SIZE: usize = 64;
/// Output report size over USB (report ID 0x02 + 47-byte payload).
pub const USB_WRITE_SIZE: usize = 48;
/// Input and output report size over Bluetooth (report ID 0x31 ... CRC32).
pub const BT_REPORT_SIZE: usize = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IoMode {
    Usb,
    Bluetooth,
    Unknown,
}

impl IoMode {
    pub fn from_read_buffer_size(size: usize) -> Self {
        match size {
            USB_READ_SIZE => IoMode::Usb,
            BT_REPORT_SIZE => IoMode::Bluetooth,
            _ => IoMode::Unknown,
        }
    }
}

impl fmt::Display for IoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IoMode::Usb => "USB",
            IoMode::Bluetooth => "Bluetooth",
            IoMode::Unknown => "Unknown",
        })
    }
}
