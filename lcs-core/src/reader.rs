//! The port reader (§4.5): one thread per port, blocking on the TAP,
//! classifying each inbound frame, and demultiplexing it to a device ring.

use std::sync::Arc;
use std::time::Duration;

use lcs_wire::{EtherType, MacAddr, MCAST_OUI};

use crate::emulator::Emulator;
use crate::host::TapReadOutcome;
use crate::port::{Port, PortFlags};
use crate::types::{DeviceType, Mode, PortId};

/// Bounded TAP read timeout (§4.5 step 3: "a few seconds").
const TAP_READ_TIMEOUT: Duration = Duration::from_secs(3);

const ETH_HDR_LEN: usize = 14;

/// Runs until the port enters `close-in-progress` and the current wait
/// wakes, per §5's "port reader observes this on its next wake".
pub fn run(emu: Arc<Emulator>, port_id: PortId) {
    let Some(port) = emu.port(port_id) else { return };
    let Some(tap) = emu.tap_for_port(port_id) else { return };

    loop {
        port.wait_for_started_or_closing();
        if port.is_closing() {
            return;
        }

        let mut buf = [0u8; 65536];
        match tap.read_timeout(&mut buf, TAP_READ_TIMEOUT) {
            TapReadOutcome::Frame(len) => {
                demux_and_enqueue(&emu, port, port_id, &buf[..len]);
            }
            TapReadOutcome::TimedOut | TapReadOutcome::Interrupted => continue,
            TapReadOutcome::Error(err) => {
                tracing::warn!(port = port.index, error = %err, "TAP read failed, port reader exiting");
                return;
            }
        }
    }
}

fn demux_and_enqueue(emu: &Arc<Emulator>, port: &Port, port_id: PortId, frame: &[u8]) {
    if frame.len() < ETH_HDR_LEN {
        return;
    }
    let dest: MacAddr = frame[0..6].try_into().unwrap();
    let raw_ether_type = u16::from_be_bytes([frame[12], frame[13]]);
    let ether_type = EtherType::classify(raw_ether_type);
    let payload = &frame[ETH_HDR_LEN..];

    if should_filter_multicast(port, &dest) {
        return;
    }

    let port_mac = port.mac();
    let Some(device_id) = select_device(emu, port_id, ether_type, &dest, payload, &port_mac) else {
        return;
    };
    let Some(device) = emu.device(device_id) else {
        return;
    };
    if !device.is_started() {
        return;
    }

    let label = format!("port{}", port.index);
    let result = device.ring.enqueue_with_backpressure(
        || device.ring.enqueue_eth(port.index as u8, frame),
        || !port.is_closing(),
        &label,
    );
    if let Err(err) = result {
        tracing::warn!(port = port.index, ?err, "dropping oversized inbound frame");
    }
}

/// §4.5 step 5: drop a multicast frame the host couldn't filter in
/// hardware, when its destination is absent from the port's table.
fn should_filter_multicast(port: &Port, dest: &MacAddr) -> bool {
    let assist_active = port.flags.lock().unwrap().contains(PortFlags::DO_MCAST_ASSIST);
    if !assist_active {
        return false;
    }
    if dest[0..3] != MCAST_OUI {
        return false;
    }
    !port.has_multicast(dest)
}

/// §4.5 step 6: the demux preference order, returning the first matching
/// *started* device, if any.
fn select_device(
    emu: &Arc<Emulator>,
    port_id: PortId,
    ether_type: EtherType,
    dest_mac: &MacAddr,
    payload: &[u8],
    port_mac: &MacAddr,
) -> Option<crate::types::DeviceId> {
    let device_ids = emu.port(port_id)?.devices.lock().unwrap().clone();

    match ether_type {
        EtherType::Ip | EtherType::Arp => {
            if let Some(dest_ip) = extract_demux_ip(ether_type, payload) {
                for id in &device_ids {
                    if let Some(dev) = emu.device(*id) {
                        if matches!(dev.mode, Mode::Ip) && dev.ip == Some(dest_ip) {
                            return Some(*id);
                        }
                    }
                }
            }
        }
        EtherType::Rarp => {
            if extract_rarp_target_mac(payload) == Some(*port_mac) {
                return fallback_device(emu, &device_ids);
            }
        }
        EtherType::Sna | EtherType::Ieee8023 => {
            for id in &device_ids {
                if let Some(dev) = emu.device(*id) {
                    if dev.is_sna() {
                        return Some(*id);
                    }
                }
            }
        }
        EtherType::Ipv6 | EtherType::Other(_) => {}
    }

    let _ = dest_mac;
    fallback_device(emu, &device_ids)
}

fn fallback_device(emu: &Arc<Emulator>, device_ids: &[crate::types::DeviceId]) -> Option<crate::types::DeviceId> {
    let mut secondary = None;
    for id in device_ids {
        if let Some(dev) = emu.device(*id) {
            match dev.dev_type {
                DeviceType::Primary if dev.is_started() => return Some(*id),
                DeviceType::Secondary if dev.is_started() => secondary = Some(*id),
                _ => {}
            }
        }
    }
    secondary
}

/// IPv4 destination address (offset 16 within the IPv4 header) or ARP
/// target IP address (offset 28 within the ARP payload), per §4.5 step 6.
fn extract_demux_ip(ether_type: EtherType, payload: &[u8]) -> Option<u32> {
    match ether_type {
        EtherType::Ip => {
            if payload.len() < 20 {
                return None;
            }
            Some(u32::from_be_bytes(payload[16..20].try_into().unwrap()))
        }
        EtherType::Arp => {
            if payload.len() < 28 + 4 {
                return None;
            }
            Some(u32::from_be_bytes(payload[28..32].try_into().unwrap()))
        }
        _ => None,
    }
}

fn extract_rarp_target_mac(payload: &[u8]) -> Option<MacAddr> {
    if payload.len() < 16 + 6 {
        return None;
    }
    payload[16..22].try_into().ok()
}
