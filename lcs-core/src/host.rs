//! External collaborator interfaces (§6). The channel I/O framework, the
//! TAP driver, and the OAT reader are out of scope (§1) — these traits are
//! the seams at which this crate expects them, matching §9's "process-wide
//! state: none required, per-instance context passed to every entry point."
//!
//! `std::sync::{Mutex, Condvar}` are used directly for the ring and are not
//! abstracted — they already are the Rust equivalent of the original's
//! mutex/condvar upcalls. Thread creation, by contrast, is kept behind
//! [`HostRuntime`]: §6 lists `create_thread`/`join_thread` as upcalls the
//! hosting channel subsystem provides, and a real host may want to name,
//! pool, or account for these threads itself rather than have the core call
//! `std::thread::spawn` unconditionally (see DESIGN.md).

use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Route;
use crate::types::{MacAddr, PortId};

/// Outcome of a bounded-timeout TAP read (§4.5 step 3).
#[derive(Debug)]
pub enum TapReadOutcome {
    /// A frame of this many bytes was read into the caller's buffer.
    Frame(usize),
    /// The read timed out with no data (the port reader re-checks its
    /// close/started gate and tries again).
    TimedOut,
    /// The read was interrupted (`EINTR`); the caller should retry
    /// immediately.
    Interrupted,
    /// Any other I/O failure; the port reader exits its loop (§4.5, §7).
    Error(String),
}

/// A host-resident virtual Ethernet interface (a TAP device), per §6.
pub trait TapDevice: Send + Sync {
    /// Reads at most `buf.len()` bytes, blocking for up to `timeout`.
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> TapReadOutcome;

    /// Writes `buf` to the TAP. Returns the number of bytes written.
    fn write(&self, buf: &[u8]) -> Result<usize, String>;
}

/// Outcome of raising a channel attention interrupt (§4.6, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttentionOutcome {
    Ok,
    Busy,
    Other,
}

/// Host-side configuration ioctls and the channel attention upcall (§6).
/// One instance is shared by every port/device in an `Emulator`.
pub trait HostOps: Send + Sync {
    /// Brings the interface up/down, sets MTU, and optionally sets the MAC
    /// (§4.3 `Startup`, `StartLan`, `StopLan`).
    fn configure_interface(
        &self,
        port: PortId,
        up: bool,
        mtu: u16,
        mac: Option<MacAddr>,
    ) -> Result<(), String>;

    fn add_route(&self, port: PortId, route: &Route) -> Result<(), String>;
    fn remove_route(&self, port: PortId, route: &Route) -> Result<(), String>;

    /// Adds a point-to-point host route for a device's IP (§4.3 `StartLan`).
    fn add_host_route(&self, port: PortId, ip: u32) -> Result<(), String>;
    fn remove_host_route(&self, port: PortId, ip: u32) -> Result<(), String>;

    fn add_multicast(&self, port: PortId, mac: MacAddr) -> Result<(), String>;
    fn remove_multicast(&self, port: PortId, mac: MacAddr) -> Result<(), String>;

    /// Probes the host NIC's hardware address, if retrievable (§4.3 `LanStats`).
    fn query_hw_address(&self, port: PortId) -> Option<MacAddr>;

    /// Raises a channel attention interrupt on a device's read sub-channel
    /// (§4.6).
    fn device_attention(&self, device: crate::types::DeviceId) -> AttentionOutcome;
}

/// Thread creation upcall (§6's `create_thread`/`join_thread`). The default
/// used outside of tests just calls `std::thread::spawn`; a real host may
/// override this to name, pool, or account for the core's long-lived
/// threads (one port reader per port, one attention thread per device).
pub trait HostRuntime: Send + Sync {
    fn spawn_named(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> JoinHandle<()>;
}

/// A [`HostRuntime`] that spawns plain OS threads, named via the platform
/// thread-name facility where supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdThreadRuntime;

impl HostRuntime for StdThreadRuntime {
    fn spawn_named(&self, name: &str, entry: Box<dyn FnOnce() + Send>) -> JoinHandle<()> {
        std::thread::Builder::new()
            .name(name.to_string())
            .spawn(entry)
            .expect("failed to spawn OS thread")
    }
}
