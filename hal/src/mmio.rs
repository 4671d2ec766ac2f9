//! Memory-mapped register windows
//!
//! A register window is a range of 32-bit device registers addressed by byte
//! offset from the window base.
//!
//! ## Safety
//!
//! Register access on real hardware is inherently unsafe. [`VolatileMmio`]
//! concentrates that unsafety in its constructor: once a window has been
//! built over a valid mapping, reads and writes are plain method calls.

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while constructing a register window
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MmioError {
    /// Base pointer is null or not 4-byte aligned
    #[error("Invalid register window base: {0:#x}")]
    InvalidBase(usize),

    /// Window size is zero or not a multiple of 4
    #[error("Invalid register window size: {0:#x}")]
    InvalidSize(usize),
}

/// Register window trait
///
/// Offsets are byte offsets and must be 4-byte aligned and inside the
/// window. Writes take `&self`: device registers are not Rust memory and a
/// write through a shared handle is the hardware's own semantics.
pub trait MmioWindow {
    /// Reads the 32-bit register at `offset`
    fn read(&self, offset: usize) -> u32;

    /// Writes the 32-bit register at `offset`
    fn write(&self, offset: usize, value: u32);

    /// Returns the window size in bytes
    fn size(&self) -> usize;
}

fn check_offset(offset: usize, size: usize) {
    assert!(
        offset % 4 == 0 && offset + 4 <= size,
        "register offset {:#x} outside window of {:#x} bytes",
        offset,
        size
    );
}

/// Real hardware register window
///
/// ## Example
///
/// ```rust,ignore
/// let regs = unsafe { VolatileMmio::new(bar0 as *mut u32, 0x20000)? };
/// let status = regs.read(0x8);
/// ```
pub struct VolatileMmio {
    base: NonNull<u32>,
    size: usize,
}

impl VolatileMmio {
    /// Creates a window over a mapped register range
    ///
    /// # Safety
    ///
    /// `base` must point at `size` bytes of mapped, uncached device
    /// registers that stay mapped for the lifetime of the window.
    pub unsafe fn new(base: *mut u32, size: usize) -> Result<Self, MmioError> {
        let base_addr = base as usize;
        if base_addr % 4 != 0 {
            return Err(MmioError::InvalidBase(base_addr));
        }
        if size == 0 || size % 4 != 0 {
            return Err(MmioError::InvalidSize(size));
        }
        let base = NonNull::new(base).ok_or(MmioError::InvalidBase(base_addr))?;
        Ok(Self { base, size })
    }
}

impl MmioWindow for VolatileMmio {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        check_offset(offset, self.size);
        // SAFETY: the constructor's contract guarantees the range is mapped,
        // and the offset was checked against it.
        unsafe { std::ptr::read_volatile(self.base.as_ptr().add(offset / 4)) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        check_offset(offset, self.size);
        // SAFETY: see `read`.
        unsafe { std::ptr::write_volatile(self.base.as_ptr().add(offset / 4), value) }
    }

    fn size(&self) -> usize {
        self.size
    }
}

// SAFETY: the window only ever performs volatile word accesses; the device
// is the synchronization point, not Rust memory.
unsafe impl Send for VolatileMmio {}

/// Simulated register file
///
/// Cloning shares the same registers, which is how a device model and a
/// driver observe each other's writes.
#[derive(Clone)]
pub struct RegisterFile {
    regs: Arc<[AtomicU32]>,
}

impl RegisterFile {
    /// Creates a zeroed register file spanning `size` bytes
    pub fn new(size: usize) -> Result<Self, MmioError> {
        if size == 0 || size % 4 != 0 {
            return Err(MmioError::InvalidSize(size));
        }
        let regs: Arc<[AtomicU32]> = (0..size / 4).map(|_| AtomicU32::new(0)).collect();
        Ok(Self { regs })
    }
}

impl MmioWindow for RegisterFile {
    fn read(&self, offset: usize) -> u32 {
        check_offset(offset, self.size());
        self.regs[offset / 4].load(Ordering::SeqCst)
    }

    fn write(&self, offset: usize, value: u32) {
        check_offset(offset, self.size());
        self.regs[offset / 4].store(value, Ordering::SeqCst);
    }

    fn size(&self) -> usize {
        self.regs.len() * 4
    }
}

impl fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterFile")
            .field("size", &self.size())
            .finish()
    }
}
