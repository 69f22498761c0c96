//! The command processor (§4.3, §4.4): consumes command frames on Write
//! CCWs, mutates port/device state, enqueues reply frames.
//!
//! Per §9's redesign guidance this is a tagged-enum match over
//! [`CommandCode`] rather than the original source's function-pointer
//! dispatch table, with one handler per arm and a shared [`build_reply`]
//! (the former `INIT_REPLY_FRAME` macro).

pub mod ip;
pub mod sna;

use lcs_wire::{CommandCode, Initiator, LcsCommandHeader};

use crate::emulator::Emulator;
use crate::error::CoreError;
use crate::types::{DeviceId, Mode};

/// Builds a reply frame: the reply header (request copied, `offset_next`
/// and `rc` cleared) followed by `payload`.
pub fn build_reply(request: &LcsCommandHeader, payload: &[u8]) -> Vec<u8> {
    build_reply_with_rc(request, payload, 0)
}

/// Builds a reply frame with an explicit header `rc` (§3/§6's return-code
/// field, distinct from a payload's own trailing status word). Used where a
/// handler must report failure via `rc = 0xFFFF` (§4.3 `SetIPM`/`DelIPM`).
pub fn build_reply_with_rc(request: &LcsCommandHeader, payload: &[u8], rc: u16) -> Vec<u8> {
    let mut reply_header = LcsCommandHeader::reply_from_request(request);
    reply_header.rc = rc;
    let mut buf = reply_header.to_bytes().to_vec();
    buf.extend_from_slice(payload);
    buf
}

/// Dispatches one command frame to its handler (§4.3, §4.4).
/// `baffle_required` threads through to the ring enqueue so a reply in an
/// SNA batch that arrived baffle-wrapped gets one back (§4.1).
pub fn dispatch(
    emu: &Emulator,
    device_id: DeviceId,
    header: LcsCommandHeader,
    payload: &[u8],
    baffle_required: bool,
) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;

    // §4.3: LAN-Gateway-initiated frames are inbound-shaped payloads, not
    // outbound commands, and are silently ignored in IP mode.
    if matches!(device.mode, Mode::Ip) && matches!(Initiator::from(header.initiator), Initiator::Lgw) {
        return Ok(());
    }

    match CommandCode::from(header.cmd) {
        CommandCode::Startup => ip::startup(emu, device_id, header, payload, baffle_required),
        CommandCode::Shutdown => ip::shutdown(emu, device_id, header, baffle_required),
        CommandCode::StartLan => ip::start_lan(emu, device_id, header, baffle_required),
        CommandCode::StopLan => ip::stop_lan(emu, device_id, header, baffle_required),
        CommandCode::QueryIpAssists => ip::query_ip_assists(emu, device_id, header, baffle_required),
        CommandCode::LanStat => ip::lan_stats(emu, device_id, header, baffle_required),
        CommandCode::SetIpm => ip::set_ipm(emu, device_id, header, payload, baffle_required),
        CommandCode::DelIpm => ip::del_ipm(emu, device_id, header, payload, baffle_required),
        CommandCode::SnaStartLan => sna::start_lan(emu, device_id, header, baffle_required),
        CommandCode::SnaStopLan => sna::stop_lan(emu, device_id, header, baffle_required),
        CommandCode::SnaLanStat => sna::lan_stats(emu, device_id, header, baffle_required),
        CommandCode::Timing
        | CommandCode::GenStat
        | CommandCode::ListLan
        | CommandCode::ListLan2
        | CommandCode::Unknown(_) => default_handler(emu, device_id, header, baffle_required),
    }
}

/// §4.3 "Unknown codes": echo the request header and enqueue, no payload.
fn default_handler(
    emu: &Emulator,
    device_id: DeviceId,
    header: LcsCommandHeader,
    baffle_required: bool,
) -> Result<(), CoreError> {
    let device = emu.device(device_id).ok_or(CoreError::NoMatchingDevice)?;
    let reply = build_reply(&header, &[]);
    device
        .ring
        .enqueue_with_backpressure(
            || device.ring.enqueue_reply(&reply, baffle_required),
            || true,
            "default-handler",
        )
        .map_err(|_| CoreError::WouldOverflow(device_id))
}
