//! Wire-format codec for the LAN Channel Station (LCS) control channel.
//!
//! This crate is pure: it has no I/O, no threads, no locks. It only knows how
//! to turn bytes into frames and frames into bytes, for both IP-passthrough
//! and SNA modes. The stateful side (device rings, command dispatch, the port
//! reader) lives in `lcs-core`.
//!
//! All multi-byte wire fields are big-endian (§4.1).

pub mod batch;
pub mod checksum;
pub mod command;
pub mod constants;
pub mod error;
pub mod header;
pub mod sna;

pub use batch::{decode_batch, BatchFrame, BatchIter};
pub use checksum::recompute_ipv4_checksums;
pub use command::{Assist, CommandCode, EtherType, Initiator};
pub use constants::*;
pub use error::WireError;
pub use header::{LcsCommandHeader, LcsHeader, MacAddr};
pub use sna::{baffle_detect, baffle_stamp_len, SIZEOF_BAFFLE};
