//! The per-device ring (§3, §4.2): a bounded, contiguous frame buffer shared
//! between the guest's blocking `Read` and however many producers (command
//! processors on Write threads, the port reader on its own thread) happen
//! to be enqueueing at once.
//!
//! The original source guards this with two locks (a data mutex and a
//! separate event mutex/condvar pair). This crate collapses that to one
//! `Mutex` paired with one `Condvar` — idiomatic Rust ties a condvar to
//! exactly the mutex it waits on, and nothing here needs to hold the data
//! lock and the event lock independently (see DESIGN.md).

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use lcs_wire::SIZEOF_BAFFLE;

/// Failure modes of the two enqueue operations (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The ring cannot accept this frame without exceeding `max_buffer_size`.
    WouldOverflow,
    /// An Ethernet payload exceeds the per-frame size ceiling.
    MessageTooLong,
}

/// Result of draining the ring for a channel `Read` (§4.8).
#[derive(Debug, Clone)]
pub struct DrainResult {
    /// Bytes actually copied into the caller's buffer.
    pub copied: usize,
    /// True if the ring held more than the caller's buffer could hold
    /// (surplus is discarded per §4.2/§7 — no data-chaining support).
    pub more: bool,
}

/// What woke a blocked channel `Read` (§4.8, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadWake {
    Pending,
    HaltOrClear,
    TimedOut,
}

#[derive(Debug)]
struct RingState {
    buffer: Vec<u8>,
    max_buffer_size: usize,
    /// Absolute offset into `buffer`, including the reserved 8-byte baffle
    /// prefix when one is pending.
    offset: usize,
    reply_pending: bool,
    data_pending: bool,
    pending_baffle: bool,
    read_waiting: bool,
    halt_or_clear: bool,
}

impl RingState {
    fn has_pending(&self) -> bool {
        self.reply_pending || self.data_pending
    }
}

/// The bounded frame-buffer ring owned by one [`crate::device::Device`].
pub struct DeviceRing {
    state: Mutex<RingState>,
    cv: Condvar,
}

/// Frame buffer sizes are clamped to this range (§3).
pub const MIN_MAX_BUFFER_SIZE: usize = 16 * 1024;
pub const MAX_MAX_BUFFER_SIZE: usize = 64 * 1024;

pub fn clamp_max_buffer_size(requested: u32) -> usize {
    (requested as usize).clamp(MIN_MAX_BUFFER_SIZE, MAX_MAX_BUFFER_SIZE)
}

/// `Startup`'s negotiation rule (§4.3): fall back to the prior value rather
/// than clamp, when the guest's request falls outside [16 KiB, 64 KiB].
pub fn negotiate_max_buffer_size(requested: u16, previous: usize) -> usize {
    let requested = requested as usize;
    if (MIN_MAX_BUFFER_SIZE..=MAX_MAX_BUFFER_SIZE).contains(&requested) {
        requested
    } else {
        previous
    }
}

impl DeviceRing {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            state: Mutex::new(RingState {
                buffer: Vec::with_capacity(max_buffer_size),
                max_buffer_size,
                offset: 0,
                reply_pending: false,
                data_pending: false,
                pending_baffle: false,
                read_waiting: false,
                halt_or_clear: false,
            }),
            cv: Condvar::new(),
        }
    }

    pub fn max_buffer_size(&self) -> usize {
        self.state.lock().unwrap().max_buffer_size
    }

    pub fn set_max_buffer_size(&self, new_size: usize) {
        self.state.lock().unwrap().max_buffer_size = new_size;
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().unwrap().has_pending()
    }

    fn ensure_capacity(buffer: &mut Vec<u8>, len: usize) {
        if buffer.len() < len {
            buffer.resize(len, 0);
        }
    }

    /// Appends a pre-built command reply frame (§4.2). If the ring is empty
    /// and `baffle_required`, reserves the 8-byte baffle envelope ahead of
    /// it.
    pub fn enqueue_reply(&self, bytes: &[u8], baffle_required: bool) -> Result<(), EnqueueError> {
        let mut st = self.state.lock().unwrap();
        if st.offset == 0 && !st.pending_baffle && baffle_required {
            st.offset = SIZEOF_BAFFLE;
            st.pending_baffle = true;
        }
        let start = st.offset;
        let end = start + bytes.len();
        if end + 2 > st.max_buffer_size {
            return Err(EnqueueError::WouldOverflow);
        }
        Self::ensure_capacity(&mut st.buffer, end);
        st.buffer[start..end].copy_from_slice(bytes);

        let stamped = if st.pending_baffle {
            (end - SIZEOF_BAFFLE) as u16
        } else {
            end as u16
        };
        st.buffer[start..start + 2].copy_from_slice(&stamped.to_be_bytes());

        st.offset = end;
        st.reply_pending = true;
        drop(st);
        self.cv.notify_all();
        Ok(())
    }

    /// Wraps `payload` in a passthrough Ethernet header and appends it
    /// (§4.2). `port_slot` is the relative-adapter byte stamped into the
    /// frame header.
    pub fn enqueue_eth(&self, port_slot: u8, payload: &[u8]) -> Result<(), EnqueueError> {
        use lcs_wire::{LcsHeader, LCS_FRAME_ETH, LCSHDR_LEN, MAX_ETH_PAYLOAD};

        let mut st = self.state.lock().unwrap();
        let budget = st
            .max_buffer_size
            .saturating_sub(LCSHDR_LEN)
            .saturating_sub(2);
        let limit = budget.min(MAX_ETH_PAYLOAD);
        if payload.len() > limit {
            return Err(EnqueueError::MessageTooLong);
        }

        let start = st.offset;
        let end = start + LCSHDR_LEN + payload.len();
        if end + 2 > st.max_buffer_size {
            return Err(EnqueueError::WouldOverflow);
        }
        Self::ensure_capacity(&mut st.buffer, end);

        let stamped = if st.pending_baffle {
            (end - SIZEOF_BAFFLE) as u16
        } else {
            end as u16
        };
        let hdr = LcsHeader {
            offset_next: stamped,
            frame_type: LCS_FRAME_ETH,
            slot: port_slot,
        };
        hdr.encode(&mut st.buffer[start..start + LCSHDR_LEN]);
        st.buffer[start + LCSHDR_LEN..end].copy_from_slice(payload);

        st.offset = end;
        st.data_pending = true;
        drop(st);
        self.cv.notify_all();
        Ok(())
    }

    /// Retries `op` with the backpressure discipline of §4.2/§5: spin with a
    /// bounded sleep (woken immediately by a consumer-side signal) while
    /// `should_continue` holds and the ring is full, logging a diagnostic
    /// roughly every three seconds.
    pub fn enqueue_with_backpressure(
        &self,
        mut op: impl FnMut() -> Result<(), EnqueueError>,
        mut should_continue: impl FnMut() -> bool,
        device_label: &str,
    ) -> Result<(), EnqueueError> {
        const WAIT_SLICE: Duration = Duration::from_millis(50);
        const LOG_EVERY: Duration = Duration::from_secs(3);

        let mut waited_since_log = Duration::ZERO;
        loop {
            match op() {
                Ok(()) => return Ok(()),
                Err(EnqueueError::MessageTooLong) => return Err(EnqueueError::MessageTooLong),
                Err(EnqueueError::WouldOverflow) => {
                    if !should_continue() {
                        return Err(EnqueueError::WouldOverflow);
                    }
                    let guard = self.state.lock().unwrap();
                    let started = Instant::now();
                    let _ = self.cv.wait_timeout(guard, WAIT_SLICE).unwrap();
                    waited_since_log += started.elapsed();
                    if waited_since_log >= LOG_EVERY {
                        tracing::warn!(device = device_label, "ring full, producer backing off");
                        waited_since_log = Duration::ZERO;
                    }
                }
            }
        }
    }

    /// Blocks until a frame is pending, a halt/clear cancels the wait, or
    /// the timeout elapses (§4.8 steps 1-2). Marks `read_waiting` for the
    /// duration of the wait so a concurrent [`Self::signal_halt_or_clear`]
    /// knows a `Read` is actually blocked.
    pub fn wait_for_read(&self, timeout: Duration) -> ReadWake {
        let mut guard = self.state.lock().unwrap();
        if guard.halt_or_clear {
            guard.halt_or_clear = false;
            return ReadWake::HaltOrClear;
        }
        if guard.has_pending() {
            return ReadWake::Pending;
        }
        guard.read_waiting = true;
        let (mut guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |st| {
                !st.has_pending() && !st.halt_or_clear
            })
            .unwrap();
        guard.read_waiting = false;
        if guard.halt_or_clear {
            guard.halt_or_clear = false;
            ReadWake::HaltOrClear
        } else if guard.has_pending() {
            ReadWake::Pending
        } else {
            ReadWake::TimedOut
        }
    }

    /// Wakes a blocked `Read` for a Halt/Clear subchannel interrupt (§4.9).
    /// Only sets the flag and signals when a `Read` is actually waiting,
    /// matching the original's "if read-waiting, set halt-or-clear and
    /// signal the device event" — a Read that hasn't been issued yet
    /// observes Halt/Clear through the channel handler's own state, not
    /// through this ring. Returns whether a waiter was actually signaled.
    pub fn signal_halt_or_clear(&self) -> bool {
        let mut guard = self.state.lock().unwrap();
        if !guard.read_waiting {
            return false;
        }
        guard.halt_or_clear = true;
        drop(guard);
        self.cv.notify_all();
        true
    }

    /// Drains the ring for a channel `Read` (§4.2, §4.8): writes a
    /// terminator, stamps the baffle length if one is pending, copies up to
    /// `out.len()` bytes, and resets the ring.
    pub fn drain_into(&self, out: &mut [u8]) -> DrainResult {
        let mut st = self.state.lock().unwrap();
        let end = st.offset;
        let total_len = end + 2;
        Self::ensure_capacity(&mut st.buffer, total_len);
        st.buffer[end..total_len].copy_from_slice(&0u16.to_be_bytes());

        if st.pending_baffle {
            let baffle = lcs_wire::baffle_stamp_len(total_len);
            st.buffer[0..SIZEOF_BAFFLE].copy_from_slice(&baffle);
        }

        let copied = total_len.min(out.len());
        out[..copied].copy_from_slice(&st.buffer[..copied]);
        let more = copied < total_len;

        st.offset = 0;
        st.reply_pending = false;
        st.data_pending = false;
        st.pending_baffle = false;
        drop(st);
        self.cv.notify_all();

        DrainResult { copied, more }
    }
}
