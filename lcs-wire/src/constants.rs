//! Wire-level constants from §6 of the specification and the original
//! Hercules LCS source (`ctc_lcs.c`, `ctcadpt.h`).

/// Frame type byte: command frame, carries an [`LcsCommandHeader`](crate::LcsCommandHeader).
pub const LCS_FRAME_CMD: u8 = 0x00;
/// Frame type byte: raw Ethernet passthrough frame.
pub const LCS_FRAME_ETH: u8 = 0x01;
/// Frame type byte: SNA baffle/SNA-data frame.
pub const LCS_FRAME_SNA: u8 = 0x04;

/// Minimum guest-negotiable frame buffer size (clamped per §3).
pub const LCS_MIN_FRAME_BUFFER_SIZE: u16 = 0x4000;
/// Default frame buffer size, used until `Startup` negotiates one.
pub const LCS_DEF_FRAME_BUFFER_SIZE: u16 = 0x5000;
/// Maximum frame buffer size (clamped per §3; IBM documents 64K as the ceiling).
pub const LCS_MAX_FRAME_BUFFER_SIZE: u16 = 0xFFFF;

/// Largest Ethernet payload an `enqueue_eth` will accept (§4.2).
pub const MAX_ETH_PAYLOAD: usize = 9000;

/// First three octets of an IPv4 multicast MAC address (§4.5, `ctc_lcs.c`).
pub const MCAST_OUI: [u8; 3] = [0x01, 0x00, 0x5e];

/// All-zero MAC, used to detect "substitute the port MAC" on outbound Ethernet (§4.7).
pub const ZERO_MAC: [u8; 6] = [0; 6];

/// Command codes (§6).
pub mod cmd_code {
    pub const TIMING: u8 = 0x00;
    pub const STRTLAN: u8 = 0x01;
    pub const STOPLAN: u8 = 0x02;
    pub const GENSTAT: u8 = 0x03;
    pub const LANSTAT: u8 = 0x04;
    pub const LISTLAN: u8 = 0x06;
    pub const STARTUP: u8 = 0x07;
    pub const SHUTDOWN: u8 = 0x08;
    pub const LISTLAN2: u8 = 0x0B;
    pub const QIPASSIST: u8 = 0xB2;
    pub const SETIPM: u8 = 0xB4;
    pub const DELIPM: u8 = 0xB5;
    pub const SNA_STRTLAN: u8 = 0x41;
    pub const SNA_STOPLAN: u8 = 0x42;
    pub const SNA_LANSTAT: u8 = 0x44;
}

/// Initiator byte values (§6).
pub mod initiator_byte {
    pub const TCPIP: u8 = 0x00;
    pub const LGW: u8 = 0x01;
    pub const SNA: u8 = 0x80;
}

/// EtherType values (§4.5, `ctcadpt.h`).
pub mod ether_type {
    /// Values below this are an 802.3 length field, not an EtherType.
    pub const ETH_TYPE_BOUNDARY: u16 = 0x0600;
    pub const IP: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const RARP: u16 = 0x8035;
    pub const SNA: u16 = 0x80D5;
    pub const IPV6: u16 = 0x86DD;
}

/// Device identity returned by Sense-ID (§6).
pub mod device_id {
    pub const CONTROL_UNIT_TYPE: u16 = 0x3088;
    pub const CONTROL_UNIT_MODEL: u8 = 0x60;
    pub const DEVICE_TYPE: u16 = 0x3088;
    pub const DEVICE_MODEL: u8 = 0x01;
}
