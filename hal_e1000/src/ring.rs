//! Descriptor Ring
//!
//! N descriptors and N buffers in DMA memory, each descriptor bound to its
//! buffer once at init. The ring itself knows nothing about ownership; the
//! transmit and receive engines read the done bit before touching a buffer.

use crate::descriptor::{RingDescriptor, DESCRIPTOR_SIZE};
use crate::error::NicError;
use crate::regs::{Registers, RingRegisters};
use hal::{DmaRegion, MmioWindow, DMA_ALIGN};

/// Next index after `index` on a ring of `len` slots
pub fn advance(index: usize, len: usize) -> usize {
    (index + 1) % len
}

/// Checks that `len` descriptors fill a whole number of 128-byte blocks
pub fn validate_ring_size(len: usize) -> Result<(), NicError> {
    match len.checked_mul(DESCRIPTOR_SIZE) {
        Some(bytes) if len > 0 && bytes % DMA_ALIGN == 0 && bytes <= u32::MAX as usize => Ok(()),
        _ => Err(NicError::InvalidRingSize(len)),
    }
}

pub(crate) struct DescriptorRing<D: RingDescriptor, const BUF: usize> {
    descriptors: DmaRegion<D>,
    buffers: DmaRegion<[u8; BUF]>,
    regs: RingRegisters,
}

impl<D: RingDescriptor, const BUF: usize> DescriptorRing<D, BUF> {
    /// Allocates and binds the ring, then publishes base, length and head
    pub(crate) fn init<W: MmioWindow>(
        len: usize,
        registers: &Registers<W>,
        regs: RingRegisters,
    ) -> Result<Self, NicError> {
        validate_ring_size(len)?;

        let mut descriptors = DmaRegion::<D>::zeroed(len)?;
        let buffers = DmaRegion::<[u8; BUF]>::zeroed(len)?;
        for index in 0..len {
            descriptors.write(index, D::bound_to(buffers.bus_addr_of(index)));
        }

        registers.set_ring_base(regs, descriptors.bus_addr());
        registers.set_ring_len(regs, descriptors.byte_len() as u32);
        registers.set_ring_head(regs, 0);

        Ok(Self {
            descriptors,
            buffers,
            regs,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub(crate) fn advance(&self, index: usize) -> usize {
        advance(index, self.len())
    }

    pub(crate) fn registers(&self) -> RingRegisters {
        self.regs
    }

    pub(crate) fn descriptor(&self, index: usize) -> D {
        self.descriptors.read(index)
    }

    /// Read-modify-write of one descriptor; the buffer binding must survive
    pub(crate) fn update<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&mut D),
    {
        let bound = self.buffers.bus_addr_of(index);
        self.descriptors.update(index, f);
        debug_assert_eq!(self.descriptors.read(index).buffer_addr(), bound);
    }

    pub(crate) fn copy_in(&mut self, index: usize, data: &[u8]) {
        self.buffers.copy_in(index, data);
    }

    pub(crate) fn copy_out(&mut self, index: usize, out: &mut [u8]) {
        self.buffers.copy_out(index, out);
    }
}
