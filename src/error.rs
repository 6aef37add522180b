//! Error types.

use thiserror::Error;

use crate::mode::IoMode;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("input report too short: {len} bytes, need at least {required}")]
    TooShort { len: usize, required: usize },
}

#[derive(Debug, Error)]
pub enum Error {
    /// The declared read buffer size matches neither USB nor Bluetooth.
    #[error("unsupported I/O mode: read buffer size {read_buffer_size} is neither USB (64) nor Bluetooth (78)")]
    UnsupportedIoMode { read_buffer_size: usize },

    #[error("cannot frame an output report for I/O mode {0}")]
    UnframeableMode(IoMode),

    #[error("write buffer of {actual} bytes is too small for a {mode} output report ({required} bytes)")]
    WriteBufferTooSmall {
        mode: IoMode,
        actual: usize,
        required: usize,
    },

    #[error("transfer size mismatch: expected {expected} bytes, got {actual}")]
    TransferSizeMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("polling has already started")]
    AlreadyPolling,

    #[error("polling has not been started")]
    NotPolling,

    #[error("failed to spawn polling worker")]
    Spawn(#[source] std::io::Error),

    #[error("polling worker panicked")]
    PollerPanicked,
}

#[derive(Debug, Error)]
pub enum PresetError {
    #[error("failed to read preset {}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid preset {}", path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode preset {}", path.display())]
    Encode {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write preset {}", path.display())]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
