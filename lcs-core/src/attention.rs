//! The attention thread (§4.6): drains a queue of attention requests and
//! raises channel-attention interrupts until each device's ring drains or
//! retries are exhausted.
//!
//! The original source's hand-rolled reversed-linked-list queue under a
//! separate `AttnLock`/`AttnEvent` pair is replaced by a `std::sync::mpsc`
//! channel (§9): the command processor is the sender, this thread the sole
//! receiver. A channel is already FIFO, so the original's "drain then
//! reverse to restore order" step has no counterpart here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::emulator::Emulator;
use crate::host::AttentionOutcome;
use crate::types::DeviceId;

/// One queued attention request (§3's `AttnRequest`, minus the intrusive
/// link — the channel itself provides ordering).
#[derive(Debug, Clone, Copy)]
pub struct AttnRequest {
    pub device: DeviceId,
}

const WAIT_TIMEOUT: Duration = Duration::from_secs(3);
const INITIAL_BACKOFF: Duration = Duration::from_micros(50);
const MAX_RETRIES: u32 = 20;

/// Body of the attention thread. Runs until `closing` is observed with no
/// request waiting.
pub fn run(emu: Arc<Emulator>, rx: Receiver<AttnRequest>, closing: Arc<AtomicBool>) {
    loop {
        let request = match rx.recv_timeout(WAIT_TIMEOUT) {
            Ok(req) => req,
            Err(RecvTimeoutError::Timeout) => {
                if closing.load(Ordering::Acquire) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };

        process_request(&emu, request);

        if closing.load(Ordering::Acquire) {
            return;
        }
    }
}

fn process_request(emu: &Arc<Emulator>, request: AttnRequest) {
    let Some(device) = emu.device(request.device) else {
        return;
    };

    let mut backoff = INITIAL_BACKOFF;
    for attempt in 0..=MAX_RETRIES {
        if !device.ring.has_pending() {
            return;
        }
        match emu.host.device_attention(request.device) {
            AttentionOutcome::Ok => return,
            AttentionOutcome::Busy => {
                if attempt == MAX_RETRIES {
                    tracing::warn!(device = request.device.0, "attention retries exhausted");
                    return;
                }
                sleep(backoff);
                backoff *= 2;
            }
            AttentionOutcome::Other => {
                tracing::warn!(device = request.device.0, "attention interrupt rejected");
                return;
            }
        }
    }
}
