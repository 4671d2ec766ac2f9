//! Receive Engine
//!
//! Software inspects the slot after the published tail. A slot moves EMPTY
//! (DD=0) → HAS-DATA (DD=1, EOP=1) when the device fills it, and back to
//! EMPTY once software has copied it out and republished it as the tail.

use crate::descriptor::{RxDescriptor, RxStatus};
use crate::error::NicError;
use crate::regs::{Registers, RX_RING};
use crate::ring::DescriptorRing;
use hal::MmioWindow;
use std::sync::atomic::{fence, Ordering};

/// Receive ring capacity
pub const RX_RING_SIZE: usize = 128;

/// Size of each receive buffer (RCTL.BSIZE = 2048)
pub const RX_BUFFER_SIZE: usize = 2048;

/// Observed state of a receive slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxSlot {
    /// Owned by the device
    Empty,
    /// A complete frame of `length` bytes
    HasData { length: usize },
    /// Done without end-of-packet; part of a multi-descriptor frame
    Fragment,
}

/// The receive half of the driver
pub struct RxRing {
    ring: DescriptorRing<RxDescriptor, RX_BUFFER_SIZE>,
    next: usize,
}

impl RxRing {
    /// Builds the ring at its standard capacity
    pub fn init<W: MmioWindow>(registers: &Registers<W>) -> Result<Self, NicError> {
        Self::with_capacity(RX_RING_SIZE, registers)
    }

    /// Builds a ring of `len` EMPTY slots and publishes tail = len - 1
    pub fn with_capacity<W: MmioWindow>(
        len: usize,
        registers: &Registers<W>,
    ) -> Result<Self, NicError> {
        let ring = DescriptorRing::init(len, registers, RX_RING)?;
        registers.set_ring_tail(RX_RING, (len - 1) as u32);
        Ok(Self { ring, next: 0 })
    }

    /// Copies the next frame into `out` without blocking
    ///
    /// Returns the number of bytes copied, which is less than the frame when
    /// `out` is shorter. The slot is handed back to the device either way.
    pub fn receive<W: MmioWindow>(
        &mut self,
        registers: &Registers<W>,
        out: &mut [u8],
    ) -> Result<usize, NicError> {
        let index = self.next;
        let length = match self.slot(index) {
            RxSlot::Empty => return Err(NicError::RingEmpty),
            RxSlot::Fragment => return Err(NicError::UnsupportedFraming { index }),
            RxSlot::HasData { length } => length,
        };

        // Buffer reads must not be hoisted above the DD observation.
        fence(Ordering::Acquire);
        let copied = length.min(out.len());
        self.ring.copy_out(index, &mut out[..copied]);

        self.ring.update(index, |d| d.status = 0);
        fence(Ordering::Release);
        registers.set_ring_tail(self.ring.registers(), index as u32);
        self.next = self.ring.advance(index);

        log::debug!(
            "e1000 rx: slot {} delivered {} of {} bytes, tail -> {}",
            index,
            copied,
            length,
            index
        );
        Ok(copied)
    }

    /// Observed state of slot `index`
    pub fn slot(&self, index: usize) -> RxSlot {
        let desc = self.ring.descriptor(index);
        let status = desc.rx_status();
        if !status.contains(RxStatus::DD) {
            RxSlot::Empty
        } else if !status.contains(RxStatus::EOP) {
            RxSlot::Fragment
        } else {
            RxSlot::HasData {
                length: usize::from(desc.length).min(RX_BUFFER_SIZE),
            }
        }
    }

    /// Next slot software will inspect
    pub fn next(&self) -> usize {
        self.next
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
