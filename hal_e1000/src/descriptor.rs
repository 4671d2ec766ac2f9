//! Hardware descriptor layouts
//!
//! Both layouts are 16 bytes, packed, little-endian on the wire. Status and
//! command bits never leave this crate; callers see typed slot states.

use bitflags::bitflags;
use hal::DmaSafe;
use static_assertions::const_assert_eq;
use std::mem;

bitflags! {
    /// Transmit descriptor command bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct TxCommand: u8 {
        /// End of packet
        const EOP = 1 << 0;
        /// Report status (hardware sets DD on completion)
        const RS = 1 << 3;
    }
}

bitflags! {
    /// Transmit descriptor status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct TxStatus: u8 {
        /// Descriptor done
        const DD = 1 << 0;
    }
}

bitflags! {
    /// Receive descriptor status bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct RxStatus: u8 {
        /// Descriptor done
        const DD = 1 << 0;
        /// End of packet
        const EOP = 1 << 1;
    }
}

/// Transmit descriptor (legacy format)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TxDescriptor {
    pub buffer_addr: u64,
    pub length: u16,
    pub cso: u8,
    pub cmd: u8,
    pub status: u8,
    pub css: u8,
    pub special: u16,
}

/// Receive descriptor (legacy format)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RxDescriptor {
    pub buffer_addr: u64,
    pub length: u16,
    pub checksum: u16,
    pub status: u8,
    pub errors: u8,
    pub special: u16,
}

const_assert_eq!(mem::size_of::<TxDescriptor>(), 16);
const_assert_eq!(mem::size_of::<RxDescriptor>(), 16);

/// Size of either descriptor in bytes
pub(crate) const DESCRIPTOR_SIZE: usize = 16;

// SAFETY: both layouts are packed plain integers; every bit pattern is valid.
unsafe impl DmaSafe for TxDescriptor {}
unsafe impl DmaSafe for RxDescriptor {}

/// A descriptor that can sit in a [`crate::ring::DescriptorRing`]
pub(crate) trait RingDescriptor: DmaSafe {
    /// A zeroed descriptor bound to the buffer at `buffer_addr`
    fn bound_to(buffer_addr: u64) -> Self;

    /// The bus address of the bound buffer
    fn buffer_addr(&self) -> u64;
}

impl RingDescriptor for TxDescriptor {
    fn bound_to(buffer_addr: u64) -> Self {
        Self {
            buffer_addr,
            ..Self::default()
        }
    }

    fn buffer_addr(&self) -> u64 {
        self.buffer_addr
    }
}

impl RingDescriptor for RxDescriptor {
    fn bound_to(buffer_addr: u64) -> Self {
        Self {
            buffer_addr,
            ..Self::default()
        }
    }

    fn buffer_addr(&self) -> u64 {
        self.buffer_addr
    }
}

impl TxDescriptor {
    pub(crate) fn is_done(&self) -> bool {
        TxStatus::from_bits_truncate(self.status).contains(TxStatus::DD)
    }
}

impl RxDescriptor {
    pub(crate) fn rx_status(&self) -> RxStatus {
        RxStatus::from_bits_truncate(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_field_offsets() {
        let desc = TxDescriptor {
            buffer_addr: 0x1122_3344_5566_7788,
            length: 0x99AA,
            cso: 0xBB,
            cmd: 0xCC,
            status: 0xDD,
            css: 0xEE,
            special: 0xF00F,
        };
        // SAFETY: TxDescriptor is 16 packed bytes.
        let bytes: [u8; 16] = unsafe { mem::transmute(desc) };
        assert_eq!(&bytes[0..8], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(&bytes[8..10], &0x99AAu16.to_le_bytes());
        assert_eq!(bytes[10], 0xBB);
        assert_eq!(bytes[11], 0xCC);
        assert_eq!(bytes[12], 0xDD);
        assert_eq!(bytes[13], 0xEE);
        assert_eq!(&bytes[14..16], &0xF00Fu16.to_le_bytes());
    }

    #[test]
    fn test_rx_descriptor_field_offsets() {
        let desc = RxDescriptor {
            buffer_addr: 1,
            length: 0x0203,
            checksum: 0x0405,
            status: 0x06,
            errors: 0x07,
            special: 0x0809,
        };
        // SAFETY: RxDescriptor is 16 packed bytes.
        let bytes: [u8; 16] = unsafe { mem::transmute(desc) };
        assert_eq!(&bytes[8..10], &0x0203u16.to_le_bytes());
        assert_eq!(&bytes[10..12], &0x0405u16.to_le_bytes());
        assert_eq!(bytes[12], 0x06);
        assert_eq!(bytes[13], 0x07);
    }

    #[test]
    fn test_bound_descriptor_is_otherwise_zero() {
        let desc = TxDescriptor::bound_to(0x4000);
        assert_eq!(desc.buffer_addr(), 0x4000);
        assert_eq!({ desc.length }, 0);
        assert!(!desc.is_done());
    }
}
