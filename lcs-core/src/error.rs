//! Core error taxonomy (§7). `WireError` (decode-time) is folded in here so
//! channel handlers have a single type to map onto sense/unit-status.

use lcs_wire::WireError;
use thiserror::Error;

use crate::types::{DeviceId, PortId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("malformed batch: {0}")]
    Wire(#[from] WireError),

    #[error("ring would overflow on device {0:?}")]
    WouldOverflow(DeviceId),

    #[error("frame too long for device {0:?}")]
    MessageTooLong(DeviceId),

    #[error("device {0:?} is not started")]
    DeviceNotStarted(DeviceId),

    #[error("port {0:?} is closing")]
    PortClosing(PortId),

    #[error("no device matched the inbound frame")]
    NoMatchingDevice,

    #[error("host I/O failed: {0}")]
    HostIo(String),
}

/// The error classes of §7, used by channel handlers to pick sense bytes
/// and unit status rather than exposing `CoreError` directly to the guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Protocol,
    HostIo,
    Resource,
}

impl CoreError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CoreError::Wire(_) => ErrorClass::Protocol,
            CoreError::HostIo(_) => ErrorClass::HostIo,
            CoreError::WouldOverflow(_) | CoreError::MessageTooLong(_) => ErrorClass::Resource,
            CoreError::DeviceNotStarted(_)
            | CoreError::PortClosing(_)
            | CoreError::NoMatchingDevice => ErrorClass::Protocol,
        }
    }
}
