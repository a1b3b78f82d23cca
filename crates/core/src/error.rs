//! Error types for open-vx-hub-core.

use crate::codec::DeviceErrorCode;
use thiserror::Error;

/// Core library error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// HID bus failure (enumeration, open, read).
    #[error("HID error: {0}")]
    Hid(String),

    /// Device not found during enumeration.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The OS/bus rejected a report write. Affects only the one command
    /// being sent; the queue keeps moving.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// The device answered with an error frame.
    #[error("device reported error: {0}")]
    Device(DeviceErrorCode),

    /// No response arrived within the command's deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The command was cancelled before resolving (device loss or shutdown).
    #[error("command cancelled")]
    Cancelled,

    /// Write attempted on an invalidated session.
    #[error("device disconnected")]
    Disconnected,

    /// Value out of safe range.
    #[error("value out of range: {field} = {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
