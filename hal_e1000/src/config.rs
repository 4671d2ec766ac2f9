//! Attach-time configuration

use crate::error::NicError;
use crate::regs::{InterPacketGap, ReceiveControl, TransmitControl};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest collision distance the 10-bit COLD field holds
const MAX_COLLISION_DISTANCE: u16 = 0x3FF;

/// Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// QEMU's default e1000 address
    pub const QEMU_DEFAULT: MacAddress = MacAddress([0x52, 0x54, 0x00, 0x12, 0x34, 0x56]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Driver configuration
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```rust,ignore
/// let config: E1000Config = serde_json::from_str(r#"{"loopback": true}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct E1000Config {
    /// Programmed into receive address 0; the device firmware is never asked
    pub mac: MacAddress,
    pub collision_threshold: u8,
    pub collision_distance: u16,
    pub inter_packet_gap: InterPacketGap,
    pub pad_short_packets: bool,
    pub broadcast_accept: bool,
    pub strip_crc: bool,
    /// MAC loopback: transmitted frames come back on the receive ring
    pub loopback: bool,
}

impl Default for E1000Config {
    fn default() -> Self {
        Self {
            mac: MacAddress::QEMU_DEFAULT,
            collision_threshold: 0x10,
            collision_distance: 0x40,
            inter_packet_gap: InterPacketGap::default(),
            pad_short_packets: true,
            broadcast_accept: true,
            strip_crc: true,
            loopback: false,
        }
    }
}

impl E1000Config {
    /// Checks that every field fits its register
    pub fn validate(&self) -> Result<(), NicError> {
        if self.collision_distance > MAX_COLLISION_DISTANCE {
            return Err(NicError::InvalidConfig(
                "collision distance exceeds 10 bits",
            ));
        }
        if !self.inter_packet_gap.fits() {
            return Err(NicError::InvalidConfig(
                "inter-packet gap field exceeds 10 bits",
            ));
        }
        Ok(())
    }

    /// The enabled transmit control word
    pub fn transmit_control(&self) -> TransmitControl {
        TransmitControl {
            enable: true,
            pad_short_packets: self.pad_short_packets,
            collision_threshold: self.collision_threshold,
            collision_distance: self.collision_distance,
        }
    }

    /// The enabled receive control word
    pub fn receive_control(&self) -> ReceiveControl {
        ReceiveControl {
            enable: true,
            loopback: self.loopback,
            broadcast_accept: self.broadcast_accept,
            strip_crc: self.strip_crc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = E1000Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transmit_control().bits(), 0x0004_010A);
        assert!(!config.receive_control().loopback);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: E1000Config =
            serde_json::from_str(r#"{"loopback": true, "collision_threshold": 15}"#).unwrap();
        assert!(config.loopback);
        assert_eq!(config.collision_threshold, 15);
        assert_eq!(config.mac, MacAddress::QEMU_DEFAULT);
        assert_eq!(config.inter_packet_gap, InterPacketGap::default());
    }

    #[test]
    fn test_mac_deserializes_from_byte_array() {
        let config: E1000Config =
            serde_json::from_str(r#"{"mac": [2, 0, 0, 0, 0, 1]}"#).unwrap();
        assert_eq!(config.mac.to_string(), "02:00:00:00:00:01");
    }

    #[test]
    fn test_oversized_fields_rejected() {
        let config = E1000Config {
            collision_distance: 0x400,
            ..E1000Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(NicError::InvalidConfig(_))
        ));

        let config = E1000Config {
            inter_packet_gap: InterPacketGap {
                ipgt: 10,
                ipgr1: 4,
                ipgr2: 0x800,
            },
            ..E1000Config::default()
        };
        assert!(config.validate().is_err());
    }
}
