//! End-to-end scenarios (spec §8 S1-S6), exercised against the fake TAP/host
//! fixtures in `common`.

mod common;

use std::thread::sleep;
use std::time::{Duration, Instant};

use common::{build_ip_emulator, build_ip_emulator_with_mcast_assist, build_sna_emulator, build_ipv4_frame, BatchBuilder, FakeTap};
use lcs_core::{channel, DeviceId};
use lcs_wire::{cmd_code, initiator_byte, LcsCommandHeader};

const DEVICE: DeviceId = DeviceId(0);

/// Gives the background port reader a moment to observe a pushed frame.
fn settle() {
    sleep(Duration::from_millis(150));
}

#[test]
fn s1_ip_startup() {
    let tap = FakeTap::new();
    let (emu, _host) = build_ip_emulator(tap, 0x0A00_0001);

    let header = LcsCommandHeader {
        cmd: cmd_code::STARTUP,
        seq: 1,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(header, &0x5000u16.to_be_bytes()).finish();

    let write_result = channel::handle_write(&emu, DEVICE, &batch).unwrap();
    assert!(!write_result.unit_check);
    assert!(emu.device(DEVICE).unwrap().is_started());

    let mut out = [0u8; 256];
    let read_result = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    assert!(!read_result.halted);

    let reply = LcsCommandHeader::decode(&out).unwrap();
    assert_eq!(reply.cmd, cmd_code::STARTUP);
    assert_eq!(reply.rc, 0);
    // The ring stamps the real next-frame offset over whatever
    // `build_reply` embedded; the terminator (offset_next == 0) follows
    // immediately after this single-frame batch.
    assert_eq!(reply.lcs_hdr.offset_next, (lcs_wire::LCSCMDHDR_LEN + 12) as u16);
    let terminator = lcs_wire::LcsHeader::decode(&out[reply.lcs_hdr.offset_next as usize..]).unwrap();
    assert_eq!(terminator.offset_next, 0);

    emu.shutdown();
}

#[test]
fn s2_start_lan_then_inbound_ipv4() {
    let tap = FakeTap::new();
    let device_ip = 0x0A00_0002;
    let (emu, _host) = build_ip_emulator(tap.clone(), device_ip);

    // Startup first, to set the device's own dev-started flag (§4.3) which
    // gates the reader's demux independently of the port-level StartLan gate.
    let startup = LcsCommandHeader {
        cmd: cmd_code::STARTUP,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(startup, &0x5000u16.to_be_bytes()).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();
    let mut drain = [0u8; 256];
    channel::handle_read(&emu, DEVICE, &mut drain).unwrap();

    // StartLan: its reply must be enqueued before the port reader is
    // unpaused, so it is first in the batch the guest reads (§5 property 2).
    let start_lan = LcsCommandHeader {
        cmd: cmd_code::STRTLAN,
        seq: 2,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(start_lan, &[]).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();

    tap.push_inbound(build_ipv4_frame([0, 1, 2, 3, 4, 5], [9, 9, 9, 9, 9, 9], device_ip));
    settle();

    let mut out = [0u8; 4096];
    let read_result = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    assert!(!read_result.halted);

    let first = LcsCommandHeader::decode(&out).unwrap();
    assert_eq!(first.cmd, cmd_code::STRTLAN);
    let first_end = first.lcs_hdr.offset_next as usize;
    assert_ne!(first_end, 0, "StartLan reply must not be the only thing read");

    let second_hdr = lcs_wire::LcsHeader::decode(&out[first_end..]).unwrap();
    assert_eq!(second_hdr.frame_type, lcs_wire::LCS_FRAME_ETH);

    emu.shutdown();
}

#[test]
fn s3_multicast_filter_drops_unlisted_destination() {
    let tap = FakeTap::new();
    let device_ip = 0x0A00_0003;
    let (emu, _host) = build_ip_emulator_with_mcast_assist(tap.clone(), device_ip);

    let startup = LcsCommandHeader {
        cmd: cmd_code::STARTUP,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(startup, &0x5000u16.to_be_bytes()).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();
    let mut drain = [0u8; 256];
    channel::handle_read(&emu, DEVICE, &mut drain).unwrap();

    let start_lan = LcsCommandHeader {
        cmd: cmd_code::STRTLAN,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(start_lan, &[]).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();
    channel::handle_read(&emu, DEVICE, &mut drain).unwrap();

    let listed: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x42];
    let unlisted: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x00, 0x99];
    emu.port(lcs_core::PortId(0)).unwrap().add_multicast(listed);

    // Both multicast frames carry a destination IP that still matches the
    // device, so only the software multicast filter can account for the
    // difference in what reaches the ring (§8 property 6).
    tap.push_inbound(build_ipv4_frame(listed, [9, 9, 9, 9, 9, 9], device_ip));
    settle();
    let mut out = [0u8; 4096];
    let first_read = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    assert!(first_read.copied > 2, "the listed multicast frame should have reached the ring");

    tap.push_inbound(build_ipv4_frame(unlisted, [9, 9, 9, 9, 9, 9], device_ip));
    settle();
    let second_read = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    assert_eq!(second_read.copied, 2, "the unlisted multicast frame must never reach the ring");

    emu.shutdown();
}

#[test]
fn s3b_set_ipm_overflow_sets_failure_rc() {
    // A per-MAC add_multicast failure must surface as rc == 0xFFFF in the
    // reply *header*, not just the payload's trailing response word.
    let tap = FakeTap::new();
    let device_ip = 0x0A00_0006;
    let (emu, _host) = build_ip_emulator_with_mcast_assist(tap, device_ip);

    let port = emu.port(lcs_core::PortId(0)).unwrap();
    for n in 0..32u8 {
        assert!(port.add_multicast([0x01, 0x00, 0x5e, 0x00, 0x00, n]));
    }

    let mut payload = Vec::new();
    payload.extend_from_slice(&1u16.to_be_bytes());
    payload.extend_from_slice(&[0u8; 6]);
    payload.extend_from_slice(&0x0A00_0064u32.to_be_bytes());
    payload.extend_from_slice(&[0x01, 0x00, 0x5e, 0x00, 0x01, 0x00]);
    payload.extend_from_slice(&[0u8; 2]);

    let header = LcsCommandHeader {
        cmd: cmd_code::SETIPM,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(header, &payload).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();

    let mut out = [0u8; 256];
    channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    let reply = LcsCommandHeader::decode(&out).unwrap();
    assert_eq!(reply.cmd, cmd_code::SETIPM);
    assert_eq!(reply.rc, 0xFFFF, "a failed SetIPM entry must set the header rc, not just the payload response word");

    emu.shutdown();
}

#[test]
fn s4_sna_baffle_passthrough_and_attention() {
    let tap = FakeTap::new();
    let (emu, host) = build_sna_emulator(tap);

    let header = LcsCommandHeader {
        cmd: cmd_code::SNA_STRTLAN,
        initiator: initiator_byte::SNA,
        ..Default::default()
    };
    let inner = BatchBuilder::new().command(header, &[]).finish();
    let mut baffled = Vec::with_capacity(8 + inner.len());
    baffled.extend_from_slice(&(inner.len() as u16).to_be_bytes());
    baffled.extend_from_slice(&[0u8; 6]);
    baffled.extend_from_slice(&inner);

    let write_result = channel::handle_write(&emu, DEVICE, &baffled).unwrap();
    assert!(!write_result.unit_check);

    // Allow the attention thread to observe the queued request.
    sleep(Duration::from_millis(100));
    assert!(!host.attention_calls.lock().unwrap().is_empty());

    let mut out = [0u8; 256];
    let read_result = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
    assert!(read_result.copied >= 8);
    let baffle_len = u16::from_be_bytes([out[0], out[1]]) as usize;
    assert_eq!(baffle_len, read_result.copied - 8);
    assert!(out[2..8].iter().all(|&b| b == 0));

    emu.shutdown();
}

#[test]
fn s5_halt_during_blocked_read() {
    let tap = FakeTap::new();
    let (emu, _host) = build_ip_emulator(tap, 0x0A00_0004);
    let emu2 = emu.clone();

    let started = Instant::now();
    let reader = std::thread::spawn(move || {
        let mut out = [0u8; 64];
        channel::handle_read(&emu2, DEVICE, &mut out).unwrap()
    });

    sleep(Duration::from_millis(10));
    let signaled = channel::handle_halt_clear(&emu, DEVICE).unwrap();
    assert!(signaled, "a Read should have been blocked and waiting");

    let result = reader.join().unwrap();
    assert!(started.elapsed() < Duration::from_millis(50));
    assert!(result.halted);
    assert_eq!(result.copied, 0);
    assert_eq!(result.residual, 64);

    emu.shutdown();
}

#[test]
fn s6_ring_overflow_backpressure_drains_without_loss() {
    // Scaled down from the spec's illustrative 9,000 frames to a handful
    // that still overflow a minimal ring, so the test runs in well under a
    // second while exercising the same backpressure path (§8 property 4).
    let tap = FakeTap::new();
    let device_ip = 0x0A00_0005;
    let (emu, _host) = build_ip_emulator(tap.clone(), device_ip);

    let startup = LcsCommandHeader {
        cmd: cmd_code::STARTUP,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(startup, &0x4000u16.to_be_bytes()).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();
    let mut drain = [0u8; 256];
    channel::handle_read(&emu, DEVICE, &mut drain).unwrap();

    let start_lan = LcsCommandHeader {
        cmd: cmd_code::STRTLAN,
        ..Default::default()
    };
    let batch = BatchBuilder::new().command(start_lan, &[]).finish();
    channel::handle_write(&emu, DEVICE, &batch).unwrap();
    channel::handle_read(&emu, DEVICE, &mut drain).unwrap();

    const FRAME_COUNT: usize = 500;
    let frame = build_ipv4_frame([0, 1, 2, 3, 4, 5], [9, 9, 9, 9, 9, 9], device_ip);
    for _ in 0..FRAME_COUNT {
        tap.push_inbound(frame.clone());
    }

    // Drain repeatedly while the producer backs off, like the guest issuing
    // repeated Reads against a paced port reader.
    let mut total_frames = 0usize;
    let deadline = Instant::now() + Duration::from_secs(5);
    while total_frames < FRAME_COUNT && Instant::now() < deadline {
        let mut out = vec![0u8; 16 * 1024];
        let result = channel::handle_read(&emu, DEVICE, &mut out).unwrap();
        if result.copied > 2 {
            let mut cursor = 0usize;
            while cursor < result.copied {
                let hdr = lcs_wire::LcsHeader::decode(&out[cursor..]).unwrap();
                if hdr.offset_next == 0 {
                    break;
                }
                total_frames += 1;
                cursor = hdr.offset_next as usize;
            }
        }
        sleep(Duration::from_millis(20));
    }

    assert_eq!(total_frames, FRAME_COUNT, "no frame should be silently dropped under backpressure");
    emu.shutdown();
}
