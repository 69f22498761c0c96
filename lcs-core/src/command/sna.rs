//! SNA-mode command handlers and baffle passthrough (§4.4).

use lcs_wire::command::reply_payload;
use lcs_wire::{Initiator, LcsCommandHeader};

use crate::attention::AttnRequest;
use crate::command::build_reply;
use crate::emulator::Emulator;
use crate::error::CoreError;
use crate::types::{mac_plus_one, DeviceId};

/// Every SNA reply carries `initiator = SNA`, `slot = port` (§4.4).
fn sna_reply_header(request: &LcsCommandHeader, port_index: u16) -> LcsCommandHeader {
    let mut header = *request;
    header.initiator = Initiator::Sna.into();
    header.lcs_hdr.slot = port_index as u8;
    header
}

fn enqueue_sna_reply(emu: &Emulator, device_id: DeviceId, reply: Vec<u8>, baffle_required: bool) -> Result<(), CoreError> {
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
        .map_err(|_| CoreError::WouldOverflow(device_id))?;

    // §4.4: after enqueueing, queue an attention request for the guest.
    emu.queue_attention(AttnRequest { device: device_id });
    Ok(())
}

pub fn start_lan(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    if let Err(err) = emu.host.configure_interface(device.port, true, 1500, Some(port.mac())) {
        tracing::warn!(device = device.addr, %err, "SNA StartLan interface enable failed");
    }

    let buffer_size = device.ring.max_buffer_size() as u16;
    let payload = reply_payload::startup_like(buffer_size, Some(mac_plus_one(port.mac())), buffer_size as u32);
    let reply_header = sna_reply_header(&header, port.index);
    let reply = build_reply(&reply_header, &payload);
    enqueue_sna_reply(emu, device_id, reply, baffle_required)?;

    port.update_port_started(true);
    device.set_started(true);
    Ok(())
}

pub fn stop_lan(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    if let Err(err) = emu.host.configure_interface(device.port, false, 1500, None) {
        tracing::warn!(device = device.addr, %err, "SNA StopLan interface disable failed");
    }
    port.update_port_started(false);
    device.set_started(false);

    let reply_header = sna_reply_header(&header, port.index);
    let reply = build_reply(&reply_header, &[]);
    enqueue_sna_reply(emu, device_id, reply, baffle_required)
}

pub fn lan_stats(emu: &Emulator, device_id: DeviceId, header: LcsCommandHeader, baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;

    let guest_visible_mac = mac_plus_one(port.mac());
    let payload = reply_payload::lan_stat_sna(1, guest_visible_mac);
    let reply_header = sna_reply_header(&header, port.index);
    let reply = build_reply(&reply_header, &payload);
    enqueue_sna_reply(emu, device_id, reply, baffle_required)
}

/// §4.4: an inbound baffle frame (wire type `0x04`) is copied verbatim to
/// the ring as a reply — no decoded invariant is asserted beyond the
/// 8-byte envelope (§9 open question).
pub fn handle_baffle_passthrough(emu: &Emulator, device_id: DeviceId, raw_frame: &[u8], baffle_required: bool) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let port = emu.port(device.port).ok_or(CoreError::NoMatchingDevice)?;
    let label = format!("device{}", device.addr);
    device
        .ring
        .enqueue_with_backpressure(
            || device.ring.enqueue_reply(raw_frame, baffle_required),
            || !port.is_closing(),
            &label,
        )
        .map_err(|_| CoreError::WouldOverflow(device_id))
}
