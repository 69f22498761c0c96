//! The top-level `Emulator`: owns the port/device arenas and wires together
//! the command processor, port readers, and attention thread (§3
//! Lifecycle).
//!
//! Per §9's redesign guidance, `Device`/`Port` cross-references are stable
//! arena indices (`DeviceId`, `PortId`), not the original source's cyclic
//! pointers; `Emulator` is the arena both index types are valid against.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use lcs_wire::Assist;

use crate::attention::{self, AttnRequest};
use crate::config::EmulatorConfig;
use crate::device::Device;
use crate::error::CoreError;
use crate::host::{HostOps, HostRuntime, TapDevice};
use crate::port::Port;
use crate::reader;
use crate::ring::clamp_max_buffer_size;
use crate::types::{DeviceId, Mode, PortId};

pub struct Emulator {
    devices: Vec<Device>,
    ports: Vec<Port>,
    taps: Vec<Mutex<Option<Arc<dyn TapDevice>>>>,
    pub(crate) host: Arc<dyn HostOps>,
    runtime: Arc<dyn HostRuntime>,

    attn_tx: Mutex<Option<mpsc::Sender<AttnRequest>>>,
    closing: Arc<AtomicBool>,
    reader_handles: Mutex<Vec<JoinHandle<()>>>,
    attention_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Emulator {
    /// Builds the port/device arenas from `config`, opens a TAP per port
    /// through `taps[port_index]`, and starts one reader thread per port
    /// plus (iff any SNA device is configured) the attention thread (§3).
    pub fn new(
        config: EmulatorConfig,
        host: Arc<dyn HostOps>,
        runtime: Arc<dyn HostRuntime>,
        taps: Vec<Arc<dyn TapDevice>>,
    ) -> Result<Arc<Emulator>, CoreError> {
        if taps.len() != config.ports.len() {
            return Err(CoreError::HostIo("tap count does not match port count".into()));
        }

        let default_size = clamp_max_buffer_size(config.default_buffer_size as u32);

        let mut ports = Vec::with_capacity(config.ports.len());
        for (idx, port_cfg) in config.ports.iter().enumerate() {
            let mac = port_cfg.hwaddr.unwrap_or([0; 6]);
            let port = Port::new(idx as u16, mac, port_cfg.if_name.clone(), Assist::always_supported());
            {
                let mut flags = port.flags.lock().unwrap();
                flags.insert(crate::port::PortFlags::CREATED);
                if port_cfg.hwaddr.is_some() {
                    flags.insert(crate::port::PortFlags::LOCAL_MAC);
                }
                if port_cfg.preconfigured {
                    flags.insert(crate::port::PortFlags::PRECONFIGURED);
                }
                if port_cfg.software_multicast_assist {
                    flags.insert(crate::port::PortFlags::DO_MCAST_ASSIST);
                }
            }
            *port.routes.lock().unwrap() = port_cfg.routes.clone();
            ports.push(port);
        }

        let mut devices = Vec::with_capacity(config.devices.len());
        let mut has_sna = false;
        for line in &config.devices {
            if matches!(line.mode, Mode::Sna) {
                has_sna = true;
            }
            let port_id = PortId(line.port);
            devices.push(Device::new(line.dev_addr, line.mode, port_id, line.dev_type, line.ip, default_size));
        }

        for (idx, device) in devices.iter().enumerate() {
            if let Some(port) = ports.get(device.port.0 as usize) {
                port.flags.lock().unwrap().insert(crate::port::PortFlags::USED);
                port.devices.lock().unwrap().push(DeviceId(idx as u16));
            }
        }

        let emu = Arc::new(Emulator {
            devices,
            ports,
            taps: taps.into_iter().map(|t| Mutex::new(Some(t))).collect(),
            host,
            runtime,
            attn_tx: Mutex::new(None),
            closing: Arc::new(AtomicBool::new(false)),
            reader_handles: Mutex::new(Vec::new()),
            attention_handle: Mutex::new(None),
        });

        for idx in 0..emu.ports.len() {
            let port_id = PortId(idx as u16);
            let emu_clone = Arc::clone(&emu);
            let handle = emu
                .runtime
                .spawn_named(&format!("lcs-port-reader-{idx}"), Box::new(move || reader::run(emu_clone, port_id)));
            emu.reader_handles.lock().unwrap().push(handle);
        }

        if has_sna {
            let (tx, rx) = mpsc::channel();
            *emu.attn_tx.lock().unwrap() = Some(tx);
            let emu_clone = Arc::clone(&emu);
            let closing = Arc::clone(&emu.closing);
            let handle = emu
                .runtime
                .spawn_named("lcs-attention", Box::new(move || attention::run(emu_clone, rx, closing)));
            *emu.attention_handle.lock().unwrap() = Some(handle);
        }

        Ok(emu)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0 as usize)
    }

    pub fn port(&self, id: PortId) -> Option<&Port> {
        self.ports.get(id.0 as usize)
    }

    pub fn tap_for_port(&self, id: PortId) -> Option<Arc<dyn TapDevice>> {
        self.taps.get(id.0 as usize)?.lock().unwrap().clone()
    }

    pub fn queue_attention(&self, request: AttnRequest) {
        if let Some(tx) = self.attn_tx.lock().unwrap().as_ref() {
            let _ = tx.send(request);
        }
    }

    /// §3 Lifecycle / §5: marks every port closing, drops the attention
    /// sender so the attention thread's `recv_timeout` sees disconnection,
    /// and joins every spawned thread.
    pub fn shutdown(&self) {
        for port in &self.ports {
            port.begin_close();
        }
        self.closing.store(true, Ordering::Release);
        self.attn_tx.lock().unwrap().take();

        for handle in self.reader_handles.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
        if let Some(handle) = self.attention_handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}
