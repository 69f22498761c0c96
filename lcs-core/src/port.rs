//! Port state (§3's Port row): the logical adapter instance grouping one or
//! more devices over a single TAP.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use lcs_wire::{Assist, MacAddr};

use crate::config::Route;
use crate::types::DeviceId;

bitflags::bitflags! {
    /// Port flags (§3). `used`, `created`, `started`, `close-in-progress`,
    /// `preconfigured`, `do-mcast-assist`, `do-cksum-offload`, `local-mac`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PortFlags: u16 {
        /// At least one device references this port.
        const USED             = 0x0001;
        /// The TAP interface has been created.
        const CREATED          = 0x0002;
        /// At least one device on this port has issued `StartLan`.
        const STARTED          = 0x0004;
        const CLOSE_IN_PROGRESS = 0x0008;
        /// The TAP device/interface already existed and was not configured
        /// by this emulator (§4.3 `Startup`: skip interface configuration).
        const PRECONFIGURED    = 0x0010;
        /// The host could not enable kernel-level multicast filtering; the
        /// port reader must filter in software (§4.5 step 5).
        const DO_MCAST_ASSIST  = 0x0020;
        const DO_CKSUM_OFFLOAD = 0x0040;
        /// A MAC address was explicitly configured (`HWADD`), rather than
        /// probed from the host NIC (§4.3 `LanStats`).
        const LOCAL_MAC        = 0x0080;
    }
}

/// Capacity of the software multicast table, matching the pair-count
/// ceiling `SetIPM`/`DelIPM` advertise (§4.3, §6).
pub const MAX_MULTICAST_PAIRS: usize = 32;

/// State shared under the port-event lock: what gates the reader thread's
/// top-of-loop wait (§4.5 step 1).
#[derive(Debug, Default)]
struct PortEventState {
    started: bool,
    closing: bool,
}

pub struct Port {
    pub index: u16,
    mac: Mutex<MacAddr>,
    pub if_name: String,
    pub flags: Mutex<PortFlags>,
    pub multicast: Mutex<HashSet<MacAddr>>,
    pub assist_supported: Assist,
    pub assist_enabled: Mutex<Assist>,
    pub routes: Mutex<Vec<Route>>,
    pub devices: Mutex<Vec<DeviceId>>,

    event_state: Mutex<PortEventState>,
    event_cv: Condvar,
    /// Set once by `StartLan`/`StopLan` via `update_port_started`, read by
    /// the port reader loop between waits without taking the event lock
    /// (cheap fast-path check; the authoritative state is `event_state`).
    started_fast: AtomicBool,
}

impl Port {
    pub fn new(index: u16, mac: MacAddr, if_name: String, assist_supported: Assist) -> Self {
        Self {
            index,
            mac: Mutex::new(mac),
            if_name,
            flags: Mutex::new(PortFlags::empty()),
            multicast: Mutex::new(HashSet::new()),
            assist_supported,
            assist_enabled: Mutex::new(Assist::empty()),
            routes: Mutex::new(Vec::new()),
            devices: Mutex::new(Vec::new()),
            event_state: Mutex::new(PortEventState::default()),
            event_cv: Condvar::new(),
            started_fast: AtomicBool::new(false),
        }
    }

    pub fn mac(&self) -> MacAddr {
        *self.mac.lock().unwrap()
    }

    pub fn set_mac(&self, mac: MacAddr) {
        *self.mac.lock().unwrap() = mac;
    }

    pub fn is_started(&self) -> bool {
        self.started_fast.load(Ordering::Acquire)
    }

    pub fn is_closing(&self) -> bool {
        self.event_state.lock().unwrap().closing
    }

    /// `update_port_started` of §4.3: `StartLan`/`StopLan` call this after
    /// (`StartLan`) or before (`StopLan`) enqueueing their reply, per the
    /// ordering guarantee of §5.
    pub fn update_port_started(&self, started: bool) {
        let mut st = self.event_state.lock().unwrap();
        st.started = started;
        self.started_fast.store(started, Ordering::Release);
        drop(st);
        self.event_cv.notify_all();
    }

    pub fn begin_close(&self) {
        let mut st = self.event_state.lock().unwrap();
        st.closing = true;
        drop(st);
        self.event_cv.notify_all();
    }

    /// The reader thread's top-of-loop wait (§4.5 step 1): blocks while the
    /// port is not yet started and not closing, waking on a state change or
    /// a 250 ms timeout so a liveness check always happens (§5 "no
    /// operation exceeds one second without a liveness check").
    pub fn wait_for_started_or_closing(&self) {
        use std::time::Duration;
        const POLL: Duration = Duration::from_millis(250);

        let guard = self.event_state.lock().unwrap();
        let _ = self
            .event_cv
            .wait_timeout_while(guard, POLL, |st| !st.started && !st.closing)
            .unwrap();
    }

    pub fn add_multicast(&self, mac: MacAddr) -> bool {
        let mut table = self.multicast.lock().unwrap();
        if table.len() >= MAX_MULTICAST_PAIRS {
            return false;
        }
        table.insert(mac);
        true
    }

    pub fn remove_multicast(&self, mac: MacAddr) {
        self.multicast.lock().unwrap().remove(&mac);
    }

    pub fn has_multicast(&self, mac: &MacAddr) -> bool {
        self.multicast.lock().unwrap().contains(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn port() -> Port {
        Port::new(0, [0, 1, 2, 3, 4, 5], "tap0".into(), Assist::always_supported())
    }

    #[test]
    fn multicast_table_is_bounded() {
        let p = port();
        for n in 0..MAX_MULTICAST_PAIRS {
            let mac = [0, 0, 0, 0, 0, n as u8];
            assert!(p.add_multicast(mac));
        }
        let one_too_many = [0, 0, 0, 0, 1, 0];
        assert!(!p.add_multicast(one_too_many));
        assert!(!p.has_multicast(&one_too_many));
    }

    #[test]
    fn add_remove_multicast_round_trips() {
        let p = port();
        let mac = [1, 2, 3, 4, 5, 6];
        assert!(!p.has_multicast(&mac));
        p.add_multicast(mac);
        assert!(p.has_multicast(&mac));
        p.remove_multicast(mac);
        assert!(!p.has_multicast(&mac));
    }

    #[test]
    fn wait_for_started_or_closing_returns_promptly_once_started() {
        let p = Arc::new(port());
        assert!(!p.is_started());
        let waiter = {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                let start = Instant::now();
                p.wait_for_started_or_closing();
                start.elapsed()
            })
        };
        thread::sleep(Duration::from_millis(30));
        p.update_port_started(true);
        let elapsed = waiter.join().unwrap();
        assert!(p.is_started());
        assert!(elapsed < Duration::from_millis(200));
    }

    #[test]
    fn wait_for_started_or_closing_wakes_on_begin_close() {
        let p = Arc::new(port());
        let waiter = {
            let p = Arc::clone(&p);
            thread::spawn(move || {
                let start = Instant::now();
                p.wait_for_started_or_closing();
                start.elapsed()
            })
        };
        thread::sleep(Duration::from_millis(30));
        p.begin_close();
        let elapsed = waiter.join().unwrap();
        assert!(p.is_closing());
        assert!(elapsed < Duration::from_millis(200));
    }

    #[test]
    fn mac_get_set_round_trips() {
        let p = port();
        assert_eq!(p.mac(), [0, 1, 2, 3, 4, 5]);
        p.set_mac([9, 9, 9, 9, 9, 9]);
        assert_eq!(p.mac(), [9, 9, 9, 9, 9, 9]);
    }
}
