//! IP-mode command handlers (§4.3).

use lcs_wire::command::reply_payload::{self, IpmPair};
use lcs_wire::LcsCommandHeader;

use crate::command::{build_reply, build_reply_with_rc};
use crate::emulator::Emulator;
use crate::error::CoreError;
use crate::port::{PortFlags, MAX_MULTICAST_PAIRS};
use crate::ring::negotiate_max_buffer_size;
use crate::types::{mac_plus_one, DeviceId};

fn enqueue(emu: &Emulator, device_id: DeviceId, reply: Vec<u8>, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;
    let label = format!("device{}", device.addr);
    device
        .ring
        .enqueue_with_backpressure(
            || device.ring.enqueue_reply(&reply, baffle_required),
            || !port.is_closing(),
            &label,
        )
        .map_err(|_| CoreError::WouldOverflow(device_id))
}

pub fn startup(
    emu: &Emulator,
    device_id: DeviceId,
    header: LcsCommandHeader,
    payload: &[u8],
    baffle_required: bool,
) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    let requested = if payload.len() >= 2 {
        u16::from_be_bytes([payload[0], payload[1]])
    } else {
        device.ring.max_buffer_size() as u16
    };
    let negotiated = negotiate_max_buffer_size(requested, device.ring.max_buffer_size());
    device.ring.set_max_buffer_size(negotiated);

    if !port.flags.lock().unwrap().contains(PortFlags::PRECONFIGURED) {
        let mac = if port.flags.lock().unwrap().contains(PortFlags::LOCAL_MAC) {
            Some(port.mac())
        } else {
            None
        };
        if let Err(err) = emu.host.configure_interface(device.port, true, 1500, mac) {
            tracing::warn!(device = device.addr, %err, "Startup interface configuration failed");
        }
    }

    let reply_payload = reply_payload::startup_like(negotiated as u16, None, negotiated as u32);
    let reply = build_reply(&header, &reply_payload);
    enqueue(emu, device_id, reply, baffle_required)?;
    device.set_started(true);
    Ok(())
}

pub fn shutdown(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let reply = build_reply(&header, &[]);
    enqueue(emu, device_id, reply, baffle_required)?;
    emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?.set_started(false);
    Ok(())
}

/// §4.3/§5: reply enqueued **before** `update_port_started(true)`, so the
/// guest never sees an inbound frame ahead of this reply.
pub fn start_lan(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    let already_started = port.is_started();
    if !already_started {
        let eligible = {
            let flags = port.flags.lock().unwrap();
            flags.contains(PortFlags::USED) && flags.contains(PortFlags::CREATED)
        };
        if eligible {
            let mac = Some(port.mac());
            if let Err(err) = emu.host.configure_interface(device.port, true, 1500, mac) {
                tracing::warn!(device = device.addr, %err, "StartLan interface enable failed");
            }
            for route in port.routes.lock().unwrap().iter() {
                if let Err(err) = emu.host.add_route(device.port, route) {
                    tracing::warn!(device = device.addr, %err, "StartLan add_route failed");
                }
            }
            if let Some(ip) = device.ip {
                if let Err(err) = emu.host.add_host_route(device.port, ip) {
                    tracing::warn!(device = device.addr, %err, "StartLan add_host_route failed");
                }
            }
        }
    }

    let buffer_size = device.ring.max_buffer_size() as u16;
    let reply_payload = reply_payload::startup_like(buffer_size, None, buffer_size as u32);
    let reply = build_reply(&header, &reply_payload);
    enqueue(emu, device_id, reply, baffle_required)?;

    port.flags.lock().unwrap().insert(PortFlags::STARTED);
    port.update_port_started(true);
    Ok(())
}

/// §4.3/§5: port reader paused (`update_port_started(false)`) **before**
/// the stop reply is enqueued, so no new frames arrive after it.
pub fn stop_lan(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    if let Err(err) = emu.host.configure_interface(device.port, false, 1500, None) {
        tracing::warn!(device = device.addr, %err, "StopLan interface disable failed");
    }
    for route in port.routes.lock().unwrap().iter() {
        let _ = emu.host.remove_route(device.port, route);
    }
    if let Some(ip) = device.ip {
        let _ = emu.host.remove_host_route(device.port, ip);
    }

    port.flags.lock().unwrap().remove(PortFlags::STARTED);
    port.update_port_started(false);

    let reply = build_reply(&header, &[]);
    enqueue(emu, device_id, reply, baffle_required)
}

pub fn query_ip_assists(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;
    let enabled = *port.assist_enabled.lock().unwrap();

    let reply_payload = reply_payload::query_ip_assists(MAX_MULTICAST_PAIRS as u16, port.assist_supported, enabled, 4);
    let reply = build_reply(&header, &reply_payload);
    enqueue(emu, device_id, reply, baffle_required)
}

pub fn lan_stats(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    if let Some(probed) = emu.host.query_hw_address(device.port) {
        if probed != port.mac() {
            if port.flags.lock().unwrap().contains(PortFlags::LOCAL_MAC) {
                tracing::warn!(device = device.addr, "host NIC MAC differs from configured HWADD; adopting host MAC");
            }
            port.set_mac(probed);
        }
    }

    let guest_visible_mac = mac_plus_one(port.mac());
    let counters = [0u32; 9];
    let reply_payload = reply_payload::lan_stat_ip(guest_visible_mac, counters);
    let reply = build_reply(&header, &reply_payload);
    enqueue(emu, device_id, reply, baffle_required)
}

fn parse_ipm_request(payload: &[u8]) -> Vec<IpmPair> {
    const ENTRY_LEN: usize = 12;
    if payload.len() < 8 {
        return Vec::new();
    }
    let requested = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let n = requested.min(MAX_MULTICAST_PAIRS).min((payload.len() - 8) / ENTRY_LEN);
    (0..n)
        .filter_map(|i| {
            let at = 8 + i * ENTRY_LEN;
            let entry = payload.get(at..at + ENTRY_LEN)?;
            Some(IpmPair {
                ip: u32::from_be_bytes(entry[0..4].try_into().unwrap()),
                mac: entry[4..10].try_into().unwrap(),
            })
        })
        .collect()
}

pub fn set_ipm(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, payload: &[u8], baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;
    let pairs = parse_ipm_request(payload);

    let software_assist = port.flags.lock().unwrap().contains(PortFlags::DO_MCAST_ASSIST);
    let mut ok = true;
    for pair in &pairs {
        if software_assist {
            if !port.add_multicast(pair.mac) {
                ok = false;
            }
        } else if emu.host.add_multicast(device.port, pair.mac).is_err() {
            ok = false;
        }
    }

    let enabled = *port.assist_enabled.lock().unwrap();
    let rc: u16 = if ok { 0 } else { 0xFFFF };
    let reply_payload = reply_payload::ipm(pairs.len() as u16, port.assist_supported, enabled, 4, &pairs, rc as u32);
    let reply = build_reply_with_rc(&header, &reply_payload, rc);
    enqueue(emu, device_id, reply, baffle_required)
}

pub fn del_ipm(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, payload: &[u8], baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;
    let pairs = parse_ipm_request(payload);

    let software_assist = port.flags.lock().unwrap().contains(PortFlags::DO_MCAST_ASSIST);
    let mut ok = true;
    for pair in &pairs {
        if software_assist {
            port.remove_multicast(pair.mac);
        } else if emu.host.remove_multicast(device.port, pair.mac).is_err() {
            ok = false;
        }
    }

    let enabled = *port.assist_enabled.lock().unwrap();
    let rc: u16 = if ok { 0 } else { 0xFFFF };
    let reply_payload = reply_payload::ipm(pairs.len() as u16, port.assist_supported, enabled, 4, &pairs, rc as u32);
    let reply = build_reply_with_rc(&header, &reply_payload, rc);
    enqueue(emu, device_id, reply, baffle_required)
}
