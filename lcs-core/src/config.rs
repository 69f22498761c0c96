//! OAT data model (§6). Parsing the OAT text itself is out of scope (§1) —
//! this module only defines the types the core consumes, so `Emulator::new`
//! takes typed configuration rather than raw OAT lines.

use crate::types::{DeviceType, MacAddr, Mode};

/// One `ROUTE port net-addr net-mask` OAT line (§3, §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub net_addr: String,
    pub net_mask: String,
}

/// Per-port configuration gathered from `HWADD`/`ROUTE` OAT lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortConfig {
    pub if_name: String,
    pub hwaddr: Option<MacAddr>,
    pub routes: Vec<Route>,
    pub preconfigured: bool,
    /// Set when the host could not enable kernel-level multicast filtering
    /// for this interface, so the port reader must filter in software
    /// (§3 `do-mcast-assist`, §4.5 step 5).
    pub software_multicast_assist: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            if_name: String::new(),
            hwaddr: None,
            routes: Vec::new(),
            preconfigured: false,
            software_multicast_assist: false,
        }
    }
}

/// Top-level typed configuration `Emulator::new` consumes — the parsed
/// shape of an OAT (§6), built by the hosting framework's OAT reader
/// (out of scope here per §1).
#[derive(Debug, Clone, Default)]
pub struct EmulatorConfig {
    /// Indexed by port number.
    pub ports: Vec<PortConfig>,
    pub devices: Vec<DeviceLine>,
    pub default_buffer_size: usize,
}

/// One device-address OAT line: `dev_addr -> {mode, port, type?, ip?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLine {
    pub dev_addr: u16,
    pub mode: Mode,
    pub port: u16,
    pub dev_type: DeviceType,
    pub ip: Option<u32>,
}
