//! Device state (§3's Device row): one LCS device pair (read/write
//! subchannels) addressed by the guest, backed by one [`DeviceRing`].

use std::sync::atomic::{AtomicBool, Ordering};

use crate::ring::DeviceRing;
use crate::types::{DeviceType, Mode, PortId};

pub struct Device {
    pub addr: u16,
    pub mode: Mode,
    pub port: PortId,
    pub dev_type: DeviceType,
    /// Network-order IPv4 address, when configured (IP mode demux key).
    pub ip: Option<u32>,

    pub ring: DeviceRing,
    started: AtomicBool,
}

impl Device {
    pub fn new(addr: u16, mode: Mode, port: PortId, dev_type: DeviceType, ip: Option<u32>, max_buffer_size: usize) -> Self {
        Self {
            addr,
            mode,
            port,
            dev_type,
            ip,
            ring: DeviceRing::new(max_buffer_size),
            started: AtomicBool::new(false),
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn set_started(&self, started: bool) {
        self.started.store(started, Ordering::Release);
    }

    pub fn is_sna(&self) -> bool {
        matches!(self.mode, Mode::Sna)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_sna_reflects_mode() {
        let sna = Device::new(0x0460, Mode::Sna, PortId(0), DeviceType::None, None, 0x4000);
        let ip = Device::new(0x0440, Mode::Ip, PortId(0), DeviceType::Primary, Some(1), 0x4000);
        assert!(sna.is_sna());
        assert!(!ip.is_sna());
    }

    #[test]
    fn set_started_round_trips() {
        let dev = Device::new(0x0440, Mode::Ip, PortId(0), DeviceType::Primary, None, 0x4000);
        assert!(!dev.is_started());
        dev.set_started(true);
        assert!(dev.is_started());
        dev.set_started(false);
        assert!(!dev.is_started());
    }
}
