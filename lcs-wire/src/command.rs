//! Command codes, assist bitmask, EtherType classification, and the
//! reply-payload layouts of §6. Per §9's redesign guidance this replaces the
//! original source's function-pointer CCW dispatch table with a tagged
//! enumeration an exhaustive `match` can dispatch over.

use crate::constants::{cmd_code, ether_type, initiator_byte};
use crate::header::MacAddr;

/// Every LCS command code named in §6, as a total tagged enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Timing,
    StartLan,
    StopLan,
    GenStat,
    LanStat,
    ListLan,
    Startup,
    Shutdown,
    ListLan2,
    QueryIpAssists,
    SetIpm,
    DelIpm,
    SnaStartLan,
    SnaStopLan,
    SnaLanStat,
    Unknown(u8),
}

impl From<u8> for CommandCode {
    fn from(byte: u8) -> Self {
        use cmd_code::*;
        match byte {
            TIMING => CommandCode::Timing,
            STRTLAN => CommandCode::StartLan,
            STOPLAN => CommandCode::StopLan,
            GENSTAT => CommandCode::GenStat,
            LANSTAT => CommandCode::LanStat,
            LISTLAN => CommandCode::ListLan,
            STARTUP => CommandCode::Startup,
            SHUTDOWN => CommandCode::Shutdown,
            LISTLAN2 => CommandCode::ListLan2,
            QIPASSIST => CommandCode::QueryIpAssists,
            SETIPM => CommandCode::SetIpm,
            DELIPM => CommandCode::DelIpm,
            SNA_STRTLAN => CommandCode::SnaStartLan,
            SNA_STOPLAN => CommandCode::SnaStopLan,
            SNA_LANSTAT => CommandCode::SnaLanStat,
            other => CommandCode::Unknown(other),
        }
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> u8 {
        use cmd_code::*;
        match code {
            CommandCode::Timing => TIMING,
            CommandCode::StartLan => STRTLAN,
            CommandCode::StopLan => STOPLAN,
            CommandCode::GenStat => GENSTAT,
            CommandCode::LanStat => LANSTAT,
            CommandCode::ListLan => LISTLAN,
            CommandCode::Startup => STARTUP,
            CommandCode::Shutdown => SHUTDOWN,
            CommandCode::ListLan2 => LISTLAN2,
            CommandCode::QueryIpAssists => QIPASSIST,
            CommandCode::SetIpm => SETIPM,
            CommandCode::DelIpm => DELIPM,
            CommandCode::SnaStartLan => SNA_STRTLAN,
            CommandCode::SnaStopLan => SNA_STOPLAN,
            CommandCode::SnaLanStat => SNA_LANSTAT,
            CommandCode::Unknown(b) => b,
        }
    }
}

/// Initiator byte (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Tcpip,
    /// LAN-Gateway: inbound-shaped payload, ignored on outbound (§4.3, §9).
    Lgw,
    Sna,
    Unknown(u8),
}

impl From<u8> for Initiator {
    fn from(byte: u8) -> Self {
        match byte {
            initiator_byte::TCPIP => Initiator::Tcpip,
            initiator_byte::LGW => Initiator::Lgw,
            initiator_byte::SNA => Initiator::Sna,
            other => Initiator::Unknown(other),
        }
    }
}

impl From<Initiator> for u8 {
    fn from(init: Initiator) -> u8 {
        match init {
            Initiator::Tcpip => initiator_byte::TCPIP,
            Initiator::Lgw => initiator_byte::LGW,
            Initiator::Sna => initiator_byte::SNA,
            Initiator::Unknown(b) => b,
        }
    }
}

/// EtherType classification used both by outbound checksum offload
/// selection and by the port reader's inbound demux (§4.5 step 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ip,
    Arp,
    Rarp,
    Sna,
    Ipv6,
    /// Value below the EtherType/length boundary (< 1536): an 802.3 frame,
    /// treated as carrying SNA (§4.5 step 4).
    Ieee8023,
    Other(u16),
}

impl EtherType {
    pub fn classify(raw: u16) -> EtherType {
        if raw < ether_type::ETH_TYPE_BOUNDARY {
            return EtherType::Ieee8023;
        }
        match raw {
            ether_type::IP => EtherType::Ip,
            ether_type::ARP => EtherType::Arp,
            ether_type::RARP => EtherType::Rarp,
            ether_type::SNA => EtherType::Sna,
            ether_type::IPV6 => EtherType::Ipv6,
            other => EtherType::Other(other),
        }
    }
}

bitflags::bitflags! {
    /// Assist bitmask (§6). Advertised assists always include Multicast and
    /// both checksum directions; IPFrag and IPv6 are never enabled (§4.3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Assist: u16 {
        const ARP        = 0x01;
        const IN_CKSUM   = 0x02;
        const OUT_CKSUM  = 0x04;
        const IP_FRAG    = 0x08;
        const IP_FILTER  = 0x10;
        const IPV6       = 0x20;
        const MULTICAST  = 0x40;
    }
}

impl Assist {
    /// The assists this core always advertises as supported (§4.3).
    pub fn always_supported() -> Assist {
        Assist::MULTICAST | Assist::IN_CKSUM | Assist::OUT_CKSUM
    }
}

/// Payload layouts that follow an [`crate::header::LcsCommandHeader`] in a
/// reply frame (§6). These are pure byte-layout builders; populating the
/// values (port MAC, negotiated buffer size, ...) is `lcs-core`'s job.
pub mod reply_payload {
    use super::*;

    /// `STARTUP`/SNA `StartLan`/SNA `LanStat` reply payload: `u16
    /// buffer_size`, 6 bytes either zero (IP `Startup`) or a MAC (SNA
    /// variants, §4.4), `u32 read_len`.
    pub fn startup_like(buffer_size: u16, mac: Option<MacAddr>, read_len: u32) -> [u8; 12] {
        let mut buf = [0u8; 12];
        buf[0..2].copy_from_slice(&buffer_size.to_be_bytes());
        if let Some(mac) = mac {
            buf[2..8].copy_from_slice(&mac);
        }
        buf[8..12].copy_from_slice(&read_len.to_be_bytes());
        buf
    }

    /// `QIPAssist` reply payload.
    pub fn query_ip_assists(n_pairs: u16, supported: Assist, enabled: Assist, ip_version: u16) -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[0..2].copy_from_slice(&n_pairs.to_be_bytes());
        buf[2..4].copy_from_slice(&supported.bits().to_be_bytes());
        buf[4..6].copy_from_slice(&enabled.bits().to_be_bytes());
        buf[6..8].copy_from_slice(&ip_version.to_be_bytes());
        buf
    }

    /// `LanStat` (IP) reply payload: 10 unused bytes, a MAC, then 9 `u32`
    /// counters.
    pub fn lan_stat_ip(mac: MacAddr, counters: [u32; 9]) -> Vec<u8> {
        let mut buf = vec![0u8; 10 + 6 + 9 * 4];
        buf[10..16].copy_from_slice(&mac);
        for (i, c) in counters.iter().enumerate() {
            let at = 16 + i * 4;
            buf[at..at + 4].copy_from_slice(&c.to_be_bytes());
        }
        buf
    }

    /// SNA `LanStat` reply payload: count, 3 unknown bytes, 2 unused, a
    /// fixed `mac_len = 6`, the MAC, and 1 unused trailing byte.
    pub fn lan_stat_sna(count: u8, mac: MacAddr) -> [u8; 14] {
        let mut buf = [0u8; 14];
        buf[0] = count;
        buf[6] = 6; // mac_len
        buf[7..13].copy_from_slice(&mac);
        buf
    }

    /// One IP/MAC pair as carried in `SetIPM`/`DelIPM` requests and replies.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpmPair {
        pub ip: u32,
        pub mac: MacAddr,
    }

    /// `SetIPM`/`DelIPM` reply payload: header fields, up to 32 pairs, and a
    /// trailing `u32` response code.
    pub fn ipm(
        n_pairs: u16,
        supported: Assist,
        enabled: Assist,
        ip_version: u16,
        pairs: &[IpmPair],
        response: u32,
    ) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + pairs.len() * 12 + 4);
        buf.extend_from_slice(&n_pairs.to_be_bytes());
        buf.extend_from_slice(&supported.bits().to_be_bytes());
        buf.extend_from_slice(&enabled.bits().to_be_bytes());
        buf.extend_from_slice(&ip_version.to_be_bytes());
        for pair in pairs.iter().take(32) {
            buf.extend_from_slice(&pair.ip.to_be_bytes());
            buf.extend_from_slice(&pair.mac);
            buf.extend_from_slice(&[0, 0]);
        }
        buf.extend_from_slice(&response.to_be_bytes());
        buf
    }
}
