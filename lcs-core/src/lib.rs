//! The stateful core of a LAN Channel Station (LCS) device emulator: the
//! per-device ring, command processor, port reader, attention thread, and
//! channel handlers built on top of the `lcs-wire` codec.
//!
//! The channel I/O framework, the TAP driver, and the OAT reader are
//! external collaborators (`host` module) — this crate drives them, it
//! does not implement them.

pub mod attention;
pub mod ccw;
pub mod channel;
pub mod command;
pub mod config;
pub mod device;
pub mod emulator;
pub mod error;
pub mod host;
pub mod port;
pub mod reader;
pub mod ring;
pub mod sense;
pub mod types;

pub use config::{DeviceLine, EmulatorConfig, PortConfig, Route};
pub use device::Device;
pub use emulator::Emulator;
pub use error::{CoreError, ErrorClass};
pub use host::{AttentionOutcome, HostOps, HostRuntime, StdThreadRuntime, TapDevice, TapReadOutcome};
pub use port::Port;
pub use types::{DeviceId, DeviceType, Mode, PortId, LCS_MAX_PORTS};
