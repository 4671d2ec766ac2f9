//! Transmit Engine
//!
//! Each slot cycles FREE (DD=1) → IN-FLIGHT (DD=0, RS|EOP) → FREE, with the
//! device setting DD on completion. Software owns only the slot at `tail`
//! and only while DD is set.
//!
//! The device treats head == tail as an empty ring, so one slot always stays
//! unused: a full ring holds `len - 1` frames.

use crate::descriptor::{TxCommand, TxDescriptor, TxStatus};
use crate::error::NicError;
use crate::regs::{Registers, TX_RING};
use crate::ring::DescriptorRing;
use hal::MmioWindow;
use std::sync::atomic::{fence, Ordering};

/// Transmit ring length in descriptors
///
/// At most `TX_RING_SIZE - 1` frames (63) are ever in flight, since the
/// slot before head is kept empty.
pub const TX_RING_SIZE: usize = 64;

/// Largest frame one transmit descriptor carries
pub const TX_PACKET_SIZE: usize = 1518;

/// Observed state of a transmit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxSlot {
    /// Software may fill it
    Free,
    /// Handed to the device, not yet completed
    InFlight,
}

/// The transmit half of the driver
pub struct TxRing {
    ring: DescriptorRing<TxDescriptor, TX_PACKET_SIZE>,
    tail: usize,
}

impl TxRing {
    /// Builds the ring at its standard capacity
    pub fn init<W: MmioWindow>(registers: &Registers<W>) -> Result<Self, NicError> {
        Self::with_capacity(TX_RING_SIZE, registers)
    }

    /// Builds a ring of `len` slots, all FREE, and publishes tail = 0
    pub fn with_capacity<W: MmioWindow>(
        len: usize,
        registers: &Registers<W>,
    ) -> Result<Self, NicError> {
        let mut ring = DescriptorRing::init(len, registers, TX_RING)?;
        for index in 0..len {
            ring.update(index, |d: &mut TxDescriptor| d.status = TxStatus::DD.bits());
        }
        registers.set_ring_tail(TX_RING, 0);
        Ok(Self { ring, tail: 0 })
    }

    /// Queues one frame without waiting for the device
    ///
    /// Fails with [`NicError::PacketTooLong`] or [`NicError::RingFull`],
    /// leaving the ring untouched in both cases.
    pub fn transmit<W: MmioWindow>(
        &mut self,
        registers: &Registers<W>,
        frame: &[u8],
    ) -> Result<(), NicError> {
        if frame.len() > TX_PACKET_SIZE {
            return Err(NicError::PacketTooLong {
                len: frame.len(),
                max: TX_PACKET_SIZE,
            });
        }

        let index = self.tail;
        let next = self.ring.advance(index);
        if !self.ring.descriptor(index).is_done()
            || next == registers.ring_head(self.ring.registers()) as usize
        {
            return Err(NicError::RingFull);
        }

        self.ring.copy_in(index, frame);
        let length = frame.len() as u16;
        self.ring.update(index, |d| {
            d.length = length;
            d.status = 0;
            d.cmd = (TxCommand::RS | TxCommand::EOP).bits();
        });

        // Descriptor and buffer writes must land before the device sees the tail.
        fence(Ordering::Release);
        self.tail = next;
        registers.set_ring_tail(self.ring.registers(), self.tail as u32);

        log::debug!(
            "e1000 tx: queued {} bytes in slot {}, tail -> {}",
            frame.len(),
            index,
            self.tail
        );
        Ok(())
    }

    /// Observed state of slot `index`
    pub fn slot(&self, index: usize) -> TxSlot {
        if self.ring.descriptor(index).is_done() {
            TxSlot::Free
        } else {
            TxSlot::InFlight
        }
    }

    /// Number of slots still owned by the device
    pub fn in_flight(&self) -> usize {
        (0..self.len())
            .filter(|&index| self.slot(index) == TxSlot::InFlight)
            .count()
    }

    /// Next slot software will fill
    pub fn tail(&self) -> usize {
        self.tail
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
