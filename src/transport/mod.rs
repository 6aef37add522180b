//! Device transport seam.
//!
//! The engine only ever does one thing with a device: write one output frame,
//! then read one input report. [`Transport`] captures exactly that, so the
//! polling engine can run against hidapi or an in-memory script.

pub mod hid;

use std::ffi::CString;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("device is not open")]
    NotOpen,

    #[error("hidapi: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("no input report within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Other(String),
}

/// Result of one write+read exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub bytes_transferred: usize,
    /// Read buffer. Only the first `bytes_transferred` bytes are meaningful.
    pub data: Vec<u8>,
}

pub trait Transport: Send {
    fn is_open(&self) -> bool;

    fn open(&mut self) -> Result<(), TransportError>;

    fn close(&mut self);

    /// Write `frame`, then block until one input report arrives.
    fn transfer(&mut self, frame: &[u8]) -> Result<Transfer, TransportError>;
}

/// Connection kind reported by the OS, before any report sizes are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bus {
    Usb,
    Bluetooth,
    Other,
}

/// One enumerated controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceDescriptor {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
    /// Opaque OS path used to open the device.
    #[serde(serialize_with = "serialize_path")]
    pub path: CString,
    pub bus: Bus,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

fn serialize_path<S: serde::Serializer>(path: &CString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&path.to_string_lossy())
}
