//! # Memory Types
//!
//! Virtual addresses and page permissions as seen at the system-call boundary.
//!
//! ## Philosophy
//!
//! - **Memory is authority, not a side effect**
//! - **Sharing only by explicit grant**: a page crosses contexts only through
//!   an IPC send or an explicit map, never by inheritance
//!
//! ## Key Types
//!
//! - [`VirtAddr`]: A user virtual address
//! - [`PagePerm`]: Permission bits for a single page mapping

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of one page (and one physical frame) in bytes
pub const PAGE_SIZE: usize = 4096;

/// First virtual address above the user-mappable range
///
/// System calls treat any address at or above `UTOP` as "no page".
pub const UTOP: usize = 0xEEC0_0000;

/// A user virtual address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Creates a virtual address
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Returns the raw address
    pub const fn as_usize(&self) -> usize {
        self.0
    }

    /// Returns the offset within the containing page
    pub const fn page_offset(&self) -> usize {
        self.0 % PAGE_SIZE
    }

    /// Checks whether the address starts a page
    pub const fn is_page_aligned(&self) -> bool {
        self.page_offset() == 0
    }

    /// Checks whether the address lies in the user-mappable range
    pub const fn is_user(&self) -> bool {
        self.0 < UTOP
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

bitflags! {
    /// Page-table permission bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PagePerm: u32 {
        /// Mapping is present
        const PRESENT = 0x001;
        /// Mapping is writable
        const WRITABLE = 0x002;
        /// Mapping is accessible from user mode
        const USER = 0x004;
        /// Bits reserved for software use
        const AVAIL = 0xE00;
    }
}

impl PagePerm {
    /// Every bit a system call may pass
    pub const SYSCALL: PagePerm = PagePerm::PRESENT
        .union(PagePerm::WRITABLE)
        .union(PagePerm::USER)
        .union(PagePerm::AVAIL);

    /// Read-only user mapping
    pub const USER_READ: PagePerm = PagePerm::PRESENT.union(PagePerm::USER);

    /// Read-write user mapping
    pub const USER_WRITE: PagePerm = PagePerm::USER_READ.union(PagePerm::WRITABLE);

    /// Checks the shape rule for syscall-supplied permissions
    ///
    /// `PRESENT | USER` must be set and nothing outside [`PagePerm::SYSCALL`]
    /// may be set.
    pub fn is_valid_for_syscall(bits: u32) -> bool {
        let required = PagePerm::USER_READ.bits();
        bits & required == required && bits & !PagePerm::SYSCALL.bits() == 0
    }

    /// Checks the write bit
    pub fn is_writable(&self) -> bool {
        self.contains(PagePerm::WRITABLE)
    }
}

impl fmt::Display for PagePerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.contains(PagePerm::PRESENT) { "P" } else { "-" },
            if self.contains(PagePerm::WRITABLE) { "W" } else { "-" },
            if self.contains(PagePerm::USER) { "U" } else { "-" }
        )
    }
}
