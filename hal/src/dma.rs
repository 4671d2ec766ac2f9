//! DMA-visible memory regions
//!
//! A [`DmaRegion`] is a zero-filled, 128-byte-aligned array that a device
//! may read and write behind the CPU's back. All CPU access is volatile so
//! the compiler never caches a value the device can change.
//!
//! Regions are identity-mapped: the CPU address of an element is also the
//! bus address handed to the device.

use std::alloc::{self, Layout};
use std::mem;
use std::ptr::{self, NonNull};
use thiserror::Error;

/// Alignment of every DMA region (descriptor-ring length granularity)
pub const DMA_ALIGN: usize = 128;

/// DMA allocation errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Zero-length region requested
    #[error("DMA region must hold at least one element")]
    Empty,

    /// Size computation overflowed
    #[error("DMA region of {0} elements is too large")]
    TooLarge(usize),

    /// Allocator returned nothing
    #[error("Out of DMA memory")]
    OutOfMemory,
}

/// Types that may live in a DMA region
///
/// # Safety
///
/// The all-zero bit pattern must be a valid value, and every bit pattern a
/// device can write must be a valid value (plain integers and packed
/// structs of plain integers qualify).
pub unsafe trait DmaSafe: Copy {}

// SAFETY: integers and byte arrays accept every bit pattern.
unsafe impl DmaSafe for u8 {}
unsafe impl DmaSafe for u16 {}
unsafe impl DmaSafe for u32 {}
unsafe impl DmaSafe for u64 {}
unsafe impl<const N: usize> DmaSafe for [u8; N] {}

/// A fixed-length, zero-filled array shared with a device
pub struct DmaRegion<T: DmaSafe> {
    ptr: NonNull<T>,
    len: usize,
    layout: Layout,
}

impl<T: DmaSafe> DmaRegion<T> {
    /// Allocates `len` zeroed elements
    pub fn zeroed(len: usize) -> Result<Self, DmaError> {
        if len == 0 || mem::size_of::<T>() == 0 {
            return Err(DmaError::Empty);
        }
        let layout = Layout::array::<T>(len)
            .and_then(|layout| layout.align_to(DMA_ALIGN.max(mem::align_of::<T>())))
            .map_err(|_| DmaError::TooLarge(len))?;

        // SAFETY: the layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw.cast::<T>()).ok_or(DmaError::OutOfMemory)?;
        Ok(Self { ptr, len, layout })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; empty regions cannot be built
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size of the region in bytes
    pub fn byte_len(&self) -> usize {
        self.len * mem::size_of::<T>()
    }

    /// Bus address of the first element
    pub fn bus_addr(&self) -> u64 {
        self.ptr.as_ptr() as usize as u64
    }

    /// Bus address of element `index`
    pub fn bus_addr_of(&self, index: usize) -> u64 {
        self.check(index);
        self.bus_addr() + (index * mem::size_of::<T>()) as u64
    }

    /// Volatile read of element `index`
    pub fn read(&self, index: usize) -> T {
        self.check(index);
        // SAFETY: in bounds, and `T: DmaSafe` accepts whatever the device wrote.
        unsafe { ptr::read_volatile(self.ptr.as_ptr().add(index)) }
    }

    /// Volatile write of element `index`
    pub fn write(&mut self, index: usize, value: T) {
        self.check(index);
        // SAFETY: in bounds.
        unsafe { ptr::write_volatile(self.ptr.as_ptr().add(index), value) }
    }

    /// Read-modify-write of element `index`
    pub fn update<F>(&mut self, index: usize, f: F)
    where
        F: FnOnce(&mut T),
    {
        let mut value = self.read(index);
        f(&mut value);
        self.write(index, value);
    }

    /// Raw pointer to element `index`, for bulk copies
    pub fn element_ptr(&mut self, index: usize) -> *mut T {
        self.check(index);
        // SAFETY: in bounds.
        unsafe { self.ptr.as_ptr().add(index) }
    }

    fn check(&self, index: usize) {
        assert!(
            index < self.len,
            "DMA index {} out of range for region of {}",
            index,
            self.len
        );
    }
}

impl<const N: usize> DmaRegion<[u8; N]> {
    /// Copies `data` into the start of buffer `index`
    ///
    /// Panics if `data` is longer than one buffer.
    pub fn copy_in(&mut self, index: usize, data: &[u8]) {
        assert!(data.len() <= N, "copy of {} bytes into {}-byte buffer", data.len(), N);
        let dst = self.element_ptr(index).cast::<u8>();
        // SAFETY: `dst` addresses N bytes owned by this region and `data`
        // cannot overlap it (the region is never handed out as a slice).
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), dst, data.len()) }
    }

    /// Copies the first `out.len()` bytes of buffer `index` into `out`
    pub fn copy_out(&mut self, index: usize, out: &mut [u8]) {
        assert!(out.len() <= N, "copy of {} bytes out of {}-byte buffer", out.len(), N);
        let src = self.element_ptr(index).cast::<u8>();
        // SAFETY: see `copy_in`.
        unsafe { ptr::copy_nonoverlapping(src, out.as_mut_ptr(), out.len()) }
    }
}

impl<T: DmaSafe> Drop for DmaRegion<T> {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed` with exactly this layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), self.layout) }
    }
}

// SAFETY: the region owns its allocation; the raw pointer is never shared
// with another Rust owner, only with the device by bus address.
unsafe impl<T: DmaSafe + Send> Send for DmaRegion<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_is_zeroed_and_aligned() {
        let region: DmaRegion<u64> = DmaRegion::zeroed(16).unwrap();
        assert_eq!(region.len(), 16);
        assert_eq!(region.byte_len(), 128);
        assert_eq!(region.bus_addr() % DMA_ALIGN as u64, 0);
        for i in 0..16 {
            assert_eq!(region.read(i), 0);
        }
    }

    #[test]
    fn test_region_rejects_empty() {
        let result: Result<DmaRegion<u32>, _> = DmaRegion::zeroed(0);
        assert_eq!(result.err(), Some(DmaError::Empty));
    }

    #[test]
    fn test_region_write_and_update() {
        let mut region: DmaRegion<u32> = DmaRegion::zeroed(4).unwrap();
        region.write(2, 5);
        region.update(2, |v| *v |= 0x10);
        assert_eq!(region.read(2), 0x15);
        assert_eq!(region.bus_addr_of(2), region.bus_addr() + 8);
    }

    #[test]
    fn test_buffer_copy_in_and_out() {
        let mut buffers: DmaRegion<[u8; 32]> = DmaRegion::zeroed(2).unwrap();
        buffers.copy_in(1, b"HELLO");

        let mut out = [0u8; 5];
        buffers.copy_out(1, &mut out);
        assert_eq!(&out, b"HELLO");
        assert_eq!(buffers.read(0), [0u8; 32]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_region_index_checked() {
        let region: DmaRegion<u8> = DmaRegion::zeroed(4).unwrap();
        region.read(4);
    }
}
