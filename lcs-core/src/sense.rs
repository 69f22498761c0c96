//! Sense and Sense-ID support for the `channel` module's CCW handlers
//! (§4.10, §6 "Device identity"). The channel I/O framework itself owns
//! sense-byte delivery and status presentation; this module only supplies
//! the device-specific content it asks for.

use lcs_wire::device_id;

bitflags::bitflags! {
    /// A minimal device sense-byte model: just enough state for Sense to
    /// return something a real channel framework would forward to the
    /// guest. Real 3088/OSA sense byte 0 carries command-reject,
    /// intervention-required, bus-out-check, equipment-check, data-check,
    /// and overrun bits; this core only ever sets the two it can actually
    /// detect.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SenseBytes: u8 {
        const COMMAND_REJECT        = 0x80;
        const INTERVENTION_REQUIRED = 0x40;
        const EQUIPMENT_CHECK       = 0x02;
    }
}

/// The fixed Sense-ID reply (§6): control-unit type/model, device
/// type/model, each as big-endian where multi-byte.
pub fn sense_id() -> [u8; 6] {
    let mut buf = [0u8; 6];
    buf[0..2].copy_from_slice(&device_id::CONTROL_UNIT_TYPE.to_be_bytes());
    buf[2] = device_id::CONTROL_UNIT_MODEL;
    buf[3..5].copy_from_slice(&device_id::DEVICE_TYPE.to_be_bytes());
    buf[5] = device_id::DEVICE_MODEL;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sense_id_matches_spec_identity() {
        let id = sense_id();
        assert_eq!(u16::from_be_bytes([id[0], id[1]]), 0x3088);
        assert_eq!(id[2], 0x60);
        assert_eq!(u16::from_be_bytes([id[3], id[4]]), 0x3088);
        assert_eq!(id[5], 0x01);
    }
}
