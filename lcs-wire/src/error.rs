//! Decode-time error taxonomy (§7, Protocol error class).

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("frame buffer truncated before a complete header")]
    Truncated,

    #[error("batch offsets are non-monotonic or out of bounds")]
    NonMonotonicOffset,

    #[error("frame length exceeds the negotiated buffer size")]
    FrameTooLong,

    #[error("unrecognized frame type 0x{0:02x}")]
    UnknownFrameType(u8),
}
