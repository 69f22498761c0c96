//! Shared test fixtures: fake TAP/host collaborators and a small batch
//! assembler, used by the end-to-end scenario tests in `scenarios.rs`.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use lcs_core::{
    AttentionOutcome, DeviceId, DeviceLine, DeviceType, Emulator, EmulatorConfig, HostOps,
    Mode, PortConfig, PortId, Route, StdThreadRuntime, TapDevice, TapReadOutcome,
};
use lcs_wire::{
    LcsCommandHeader, LcsHeader, MacAddr, LCSCMDHDR_LEN, LCSHDR_LEN, LCS_FRAME_CMD, LCS_FRAME_ETH,
};

/// A TAP stand-in: inbound frames are pushed by the test, outbound writes
/// are captured for assertions.
pub struct FakeTap {
    inbound: Mutex<VecDeque<Vec<u8>>>,
    cv: Condvar,
    outbound: Mutex<Vec<Vec<u8>>>,
}

impl FakeTap {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inbound: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            outbound: Mutex::new(Vec::new()),
        })
    }

    pub fn push_inbound(&self, frame: Vec<u8>) {
        self.inbound.lock().unwrap().push_back(frame);
        self.cv.notify_all();
    }

    pub fn outbound_frames(&self) -> Vec<Vec<u8>> {
        self.outbound.lock().unwrap().clone()
    }
}

impl TapDevice for FakeTap {
    fn read_timeout(&self, buf: &mut [u8], timeout: Duration) -> TapReadOutcome {
        let guard = self.inbound.lock().unwrap();
        let (mut guard, _) = self.cv.wait_timeout_while(guard, timeout, |q| q.is_empty()).unwrap();
        match guard.pop_front() {
            Some(frame) => {
                let len = frame.len().min(buf.len());
                buf[..len].copy_from_slice(&frame[..len]);
                TapReadOutcome::Frame(len)
            }
            None => TapReadOutcome::TimedOut,
        }
    }

    fn write(&self, buf: &[u8]) -> Result<usize, String> {
        self.outbound.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }
}

/// A host collaborator stand-in: every ioctl succeeds and is a no-op;
/// attention calls are recorded for assertions.
#[derive(Default)]
pub struct FakeHost {
    pub attention_calls: Mutex<Vec<DeviceId>>,
}

impl HostOps for FakeHost {
    fn configure_interface(&self, _port: PortId, _up: bool, _mtu: u16, _mac: Option<MacAddr>) -> Result<(), String> {
        Ok(())
    }

    fn add_route(&self, _port: PortId, _route: &Route) -> Result<(), String> {
        Ok(())
    }

    fn remove_route(&self, _port: PortId, _route: &Route) -> Result<(), String> {
        Ok(())
    }

    fn add_host_route(&self, _port: PortId, _ip: u32) -> Result<(), String> {
        Ok(())
    }

    fn remove_host_route(&self, _port: PortId, _ip: u32) -> Result<(), String> {
        Ok(())
    }

    fn add_multicast(&self, _port: PortId, _mac: MacAddr) -> Result<(), String> {
        Ok(())
    }

    fn remove_multicast(&self, _port: PortId, _mac: MacAddr) -> Result<(), String> {
        Ok(())
    }

    fn query_hw_address(&self, _port: PortId) -> Option<MacAddr> {
        None
    }

    fn device_attention(&self, device: DeviceId) -> AttentionOutcome {
        self.attention_calls.lock().unwrap().push(device);
        AttentionOutcome::Ok
    }
}

/// Assembles an LCS batch frame-by-frame, computing each `offset_next` and
/// appending the zero terminator on `finish()` (§4.1).
pub struct BatchBuilder {
    buf: Vec<u8>,
}

impl BatchBuilder {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn command(mut self, mut header: LcsCommandHeader, payload: &[u8]) -> Self {
        let start = self.buf.len();
        let next = start + LCSCMDHDR_LEN + payload.len();
        header.lcs_hdr.offset_next = next as u16;
        header.lcs_hdr.frame_type = LCS_FRAME_CMD;
        self.buf.extend_from_slice(&header.to_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn eth(mut self, slot: u8, payload: &[u8]) -> Self {
        let start = self.buf.len();
        let next = start + LCSHDR_LEN + payload.len();
        let hdr = LcsHeader {
            offset_next: next as u16,
            frame_type: LCS_FRAME_ETH,
            slot,
        };
        self.buf.extend_from_slice(&hdr.to_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(&LcsHeader::default().to_bytes());
        self.buf
    }
}

/// Builds a minimal Ethernet/IPv4 frame addressed to `dst_ip`, as the port
/// reader's demux would see it arrive from the TAP.
pub fn build_ipv4_frame(dst_mac: MacAddr, src_mac: MacAddr, dst_ip: u32) -> Vec<u8> {
    let mut frame = vec![0u8; 14];
    frame[0..6].copy_from_slice(&dst_mac);
    frame[6..12].copy_from_slice(&src_mac);
    frame[12..14].copy_from_slice(&0x0800u16.to_be_bytes());
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[9] = 6;
    ip[16..20].copy_from_slice(&dst_ip.to_be_bytes());
    frame.extend_from_slice(&ip);
    frame
}

/// A single-port, single-IP-device emulator fixture.
pub fn build_ip_emulator(tap: Arc<FakeTap>, ip: u32) -> (Arc<Emulator>, Arc<FakeHost>) {
    let config = EmulatorConfig {
        ports: vec![PortConfig {
            if_name: "tap0".into(),
            hwaddr: Some([0, 1, 2, 3, 4, 5]),
            routes: Vec::new(),
            preconfigured: false,
            software_multicast_assist: false,
        }],
        devices: vec![DeviceLine {
            dev_addr: 0x0440,
            mode: Mode::Ip,
            port: 0,
            dev_type: DeviceType::Primary,
            ip: Some(ip),
        }],
        default_buffer_size: 0x5000,
    };
    let host = Arc::new(FakeHost::default());
    let runtime = Arc::new(StdThreadRuntime);
    let emu = Emulator::new(config, host.clone(), runtime, vec![tap as Arc<dyn TapDevice>]).unwrap();
    (emu, host)
}

/// A single-port, single-IP-device emulator fixture with software
/// multicast assist enabled (§4.5 step 5, scenario S3).
pub fn build_ip_emulator_with_mcast_assist(tap: Arc<FakeTap>, ip: u32) -> (Arc<Emulator>, Arc<FakeHost>) {
    let config = EmulatorConfig {
        ports: vec![PortConfig {
            if_name: "tap0".into(),
            hwaddr: Some([0, 1, 2, 3, 4, 5]),
            routes: Vec::new(),
            preconfigured: false,
            software_multicast_assist: true,
        }],
        devices: vec![DeviceLine {
            dev_addr: 0x0440,
            mode: Mode::Ip,
            port: 0,
            dev_type: DeviceType::Primary,
            ip: Some(ip),
        }],
        default_buffer_size: 0x5000,
    };
    let host = Arc::new(FakeHost::default());
    let runtime = Arc::new(StdThreadRuntime);
    let emu = Emulator::new(config, host.clone(), runtime, vec![tap as Arc<dyn TapDevice>]).unwrap();
    (emu, host)
}

/// A single-port, single-SNA-device emulator fixture.
pub fn build_sna_emulator(tap: Arc<FakeTap>) -> (Arc<Emulator>, Arc<FakeHost>) {
    let config = EmulatorConfig {
        ports: vec![PortConfig {
            if_name: "tap0".into(),
            hwaddr: Some([0, 1, 2, 3, 4, 5]),
            routes: Vec::new(),
            preconfigured: false,
            software_multicast_assist: false,
        }],
        devices: vec![DeviceLine {
            dev_addr: 0x0460,
            mode: Mode::Sna,
            port: 0,
            dev_type: DeviceType::None,
            ip: None,
        }],
        default_buffer_size: 0x5000,
    };
    let host = Arc::new(FakeHost::default());
    let runtime = Arc::new(StdThreadRuntime);
    let emu = Emulator::new(config, host.clone(), runtime, vec![tap as Arc<dyn TapDevice>]).unwrap();
    (emu, host)
}
