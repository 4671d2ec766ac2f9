//! Device Register Interface
//!
//! Offsets are byte offsets into the 82540EM register window. [`Registers`]
//! is a thin typed accessor: every method is exactly one register read or
//! write (a 64-bit base is two). There are no retries at this layer.

use crate::config::MacAddress;
use hal::MmioWindow;
use serde::{Deserialize, Serialize};

/// Device status (read-only)
pub const STATUS: usize = 0x0008;

/// Receive control
pub const RCTL: usize = 0x0100;
/// Transmit control
pub const TCTL: usize = 0x0400;
/// Transmit inter-packet gap
pub const TIPG: usize = 0x0410;

/// Receive descriptor base low
pub const RDBAL: usize = 0x2800;
/// Receive descriptor base high
pub const RDBAH: usize = 0x2804;
/// Receive descriptor ring length in bytes
pub const RDLEN: usize = 0x2808;
/// Receive descriptor head
pub const RDH: usize = 0x2810;
/// Receive descriptor tail
pub const RDT: usize = 0x2818;

/// Transmit descriptor base low
pub const TDBAL: usize = 0x3800;
/// Transmit descriptor base high
pub const TDBAH: usize = 0x3804;
/// Transmit descriptor ring length in bytes
pub const TDLEN: usize = 0x3808;
/// Transmit descriptor head
pub const TDH: usize = 0x3810;
/// Transmit descriptor tail
pub const TDT: usize = 0x3818;

/// Multicast table array (128 words)
pub const MTA: usize = 0x5200;
/// Number of multicast table words
pub const MTA_ENTRIES: usize = 128;
/// Receive address low (MAC bytes 0-3)
pub const RAL0: usize = 0x5400;
/// Receive address high (MAC bytes 4-5 + flags)
pub const RAH0: usize = 0x5404;

const TCTL_EN: u32 = 1 << 1;
const TCTL_PSP: u32 = 1 << 3;
const TCTL_CT_SHIFT: u32 = 4;
const TCTL_CT_MASK: u32 = 0xFF << TCTL_CT_SHIFT;
const TCTL_COLD_SHIFT: u32 = 12;
const TCTL_COLD_MASK: u32 = 0x3FF << TCTL_COLD_SHIFT;

const TIPG_FIELD_MASK: u32 = 0x3FF;
const TIPG_IPGR1_SHIFT: u32 = 10;
const TIPG_IPGR2_SHIFT: u32 = 20;

const RCTL_EN: u32 = 1 << 1;
const RCTL_LBM_SHIFT: u32 = 6;
const RCTL_LBM_MASK: u32 = 0b11 << RCTL_LBM_SHIFT;
const RCTL_LBM_MAC: u32 = 0b01 << RCTL_LBM_SHIFT;
const RCTL_BAM: u32 = 1 << 15;
const RCTL_BSIZE_MASK: u32 = 0b11 << 16;
const RCTL_SECRC: u32 = 1 << 26;

const RAH_AV: u32 = 1 << 31;

/// Register offsets of one descriptor ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingRegisters {
    pub base_low: usize,
    pub base_high: usize,
    pub length: usize,
    pub head: usize,
    pub tail: usize,
}

/// The transmit ring's registers
pub const TX_RING: RingRegisters = RingRegisters {
    base_low: TDBAL,
    base_high: TDBAH,
    length: TDLEN,
    head: TDH,
    tail: TDT,
};

/// The receive ring's registers
pub const RX_RING: RingRegisters = RingRegisters {
    base_low: RDBAL,
    base_high: RDBAH,
    length: RDLEN,
    head: RDH,
    tail: RDT,
};

/// Transmit control word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitControl {
    pub enable: bool,
    pub pad_short_packets: bool,
    pub collision_threshold: u8,
    /// 10-bit field; wider values are truncated
    pub collision_distance: u16,
}

impl TransmitControl {
    /// Encodes the register value
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.enable {
            bits |= TCTL_EN;
        }
        if self.pad_short_packets {
            bits |= TCTL_PSP;
        }
        bits |= (u32::from(self.collision_threshold) << TCTL_CT_SHIFT) & TCTL_CT_MASK;
        bits |= (u32::from(self.collision_distance) << TCTL_COLD_SHIFT) & TCTL_COLD_MASK;
        bits
    }

    /// Decodes a register value
    pub fn from_bits(bits: u32) -> Self {
        Self {
            enable: bits & TCTL_EN != 0,
            pad_short_packets: bits & TCTL_PSP != 0,
            collision_threshold: ((bits & TCTL_CT_MASK) >> TCTL_CT_SHIFT) as u8,
            collision_distance: ((bits & TCTL_COLD_MASK) >> TCTL_COLD_SHIFT) as u16,
        }
    }
}

/// Transmit inter-packet gap, three 10-bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterPacketGap {
    pub ipgt: u16,
    pub ipgr1: u16,
    pub ipgr2: u16,
}

impl InterPacketGap {
    /// Encodes the register value
    pub fn bits(&self) -> u32 {
        (u32::from(self.ipgt) & TIPG_FIELD_MASK)
            | ((u32::from(self.ipgr1) & TIPG_FIELD_MASK) << TIPG_IPGR1_SHIFT)
            | ((u32::from(self.ipgr2) & TIPG_FIELD_MASK) << TIPG_IPGR2_SHIFT)
    }

    /// Decodes a register value
    pub fn from_bits(bits: u32) -> Self {
        Self {
            ipgt: (bits & TIPG_FIELD_MASK) as u16,
            ipgr1: ((bits >> TIPG_IPGR1_SHIFT) & TIPG_FIELD_MASK) as u16,
            ipgr2: ((bits >> TIPG_IPGR2_SHIFT) & TIPG_FIELD_MASK) as u16,
        }
    }

    /// Checks that every field fits in 10 bits
    pub fn fits(&self) -> bool {
        [self.ipgt, self.ipgr1, self.ipgr2]
            .iter()
            .all(|v| u32::from(*v) <= TIPG_FIELD_MASK)
    }
}

impl Default for InterPacketGap {
    fn default() -> Self {
        Self {
            ipgt: 10,
            ipgr1: 4,
            ipgr2: 6,
        }
    }
}

/// Receive control word
///
/// Buffer size is always 2048 bytes (BSIZE = 00) and long packets are never
/// enabled, so neither is configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveControl {
    pub enable: bool,
    /// MAC loopback mode
    pub loopback: bool,
    pub broadcast_accept: bool,
    pub strip_crc: bool,
}

impl ReceiveControl {
    /// Encodes the register value
    pub fn bits(&self) -> u32 {
        let mut bits = 0;
        if self.enable {
            bits |= RCTL_EN;
        }
        if self.loopback {
            bits |= RCTL_LBM_MAC;
        }
        if self.broadcast_accept {
            bits |= RCTL_BAM;
        }
        if self.strip_crc {
            bits |= RCTL_SECRC;
        }
        bits & !RCTL_BSIZE_MASK
    }

    /// Decodes a register value
    pub fn from_bits(bits: u32) -> Self {
        Self {
            enable: bits & RCTL_EN != 0,
            loopback: bits & RCTL_LBM_MASK == RCTL_LBM_MAC,
            broadcast_accept: bits & RCTL_BAM != 0,
            strip_crc: bits & RCTL_SECRC != 0,
        }
    }
}

/// Typed accessor over the device's register window
pub struct Registers<W: MmioWindow> {
    window: W,
}

impl<W: MmioWindow> Registers<W> {
    /// Wraps a register window
    pub fn new(window: W) -> Self {
        Self { window }
    }

    /// Returns the underlying window
    pub fn window(&self) -> &W {
        &self.window
    }

    /// Reads the device status register
    pub fn status(&self) -> u32 {
        self.window.read(STATUS)
    }

    /// Reads a ring's 64-bit descriptor base address
    pub fn ring_base(&self, ring: RingRegisters) -> u64 {
        let low = u64::from(self.window.read(ring.base_low));
        let high = u64::from(self.window.read(ring.base_high));
        (high << 32) | low
    }

    /// Writes a ring's 64-bit descriptor base address
    pub fn set_ring_base(&self, ring: RingRegisters, addr: u64) {
        self.window.write(ring.base_low, addr as u32);
        self.window.write(ring.base_high, (addr >> 32) as u32);
    }

    /// Reads a ring's length in bytes
    pub fn ring_len(&self, ring: RingRegisters) -> u32 {
        self.window.read(ring.length)
    }

    /// Writes a ring's length in bytes
    pub fn set_ring_len(&self, ring: RingRegisters, bytes: u32) {
        self.window.write(ring.length, bytes);
    }

    /// Reads a ring's hardware cursor
    pub fn ring_head(&self, ring: RingRegisters) -> u32 {
        self.window.read(ring.head)
    }

    /// Writes a ring's hardware cursor (only legal before enable)
    pub fn set_ring_head(&self, ring: RingRegisters, index: u32) {
        self.window.write(ring.head, index);
    }

    /// Reads a ring's software cursor
    pub fn ring_tail(&self, ring: RingRegisters) -> u32 {
        self.window.read(ring.tail)
    }

    /// Publishes a ring's software cursor to hardware
    pub fn set_ring_tail(&self, ring: RingRegisters, index: u32) {
        self.window.write(ring.tail, index);
    }

    /// Reads the transmit control register
    pub fn transmit_control(&self) -> TransmitControl {
        TransmitControl::from_bits(self.window.read(TCTL))
    }

    /// Writes the transmit control register
    pub fn set_transmit_control(&self, control: TransmitControl) {
        self.window.write(TCTL, control.bits());
    }

    /// Reads the inter-packet gap register
    pub fn inter_packet_gap(&self) -> InterPacketGap {
        InterPacketGap::from_bits(self.window.read(TIPG))
    }

    /// Writes the inter-packet gap register
    pub fn set_inter_packet_gap(&self, gap: InterPacketGap) {
        self.window.write(TIPG, gap.bits());
    }

    /// Reads the receive control register
    pub fn receive_control(&self) -> ReceiveControl {
        ReceiveControl::from_bits(self.window.read(RCTL))
    }

    /// Writes the receive control register
    pub fn set_receive_control(&self, control: ReceiveControl) {
        self.window.write(RCTL, control.bits());
    }

    /// Programs receive address 0 and marks it valid
    pub fn set_receive_address(&self, mac: MacAddress) {
        let b = mac.octets();
        let low = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        let high = u32::from(u16::from_le_bytes([b[4], b[5]])) | RAH_AV;
        self.window.write(RAL0, low);
        self.window.write(RAH0, high);
    }

    /// Reads receive address 0, if marked valid
    pub fn receive_address(&self) -> Option<MacAddress> {
        let high = self.window.read(RAH0);
        if high & RAH_AV == 0 {
            return None;
        }
        let low = self.window.read(RAL0).to_le_bytes();
        let high = (high as u16).to_le_bytes();
        Some(MacAddress::new([
            low[0], low[1], low[2], low[3], high[0], high[1],
        ]))
    }

    /// Zeroes the multicast table
    pub fn clear_multicast_table(&self) {
        for entry in 0..MTA_ENTRIES {
            self.window.write(MTA + entry * 4, 0);
        }
    }

    /// Reads one multicast table word
    pub fn multicast_entry(&self, entry: usize) -> u32 {
        assert!(entry < MTA_ENTRIES, "multicast entry {} out of range", entry);
        self.window.read(MTA + entry * 4)
    }
}
