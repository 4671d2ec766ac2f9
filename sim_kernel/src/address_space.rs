//! Physical frames and per-context page tables
//!
//! Frames are reference counted: every mapping holds one reference, and a
//! frame is freed when its last mapping goes away. The frame table is
//! bounded so tests can exhaust it on purpose.

use core_types::{EnvId, PagePerm, VirtAddr, PAGE_SIZE};
use ipc::{IpcError, PageTransfer};
use kernel_api::KernelError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identifies a physical frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", self.0)
    }
}

struct Frame {
    data: Box<[u8; PAGE_SIZE]>,
    refs: usize,
}

/// One page-table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mapping {
    pub frame: FrameId,
    pub perm: PagePerm,
}

/// Frames plus every context's page table
pub struct AddressSpaces {
    frames: HashMap<FrameId, Frame>,
    next_frame: u64,
    max_frames: usize,
    tables: HashMap<EnvId, BTreeMap<VirtAddr, Mapping>>,
}

impl AddressSpaces {
    /// Creates an empty memory with room for `max_frames` frames
    pub fn new(max_frames: usize) -> Self {
        Self {
            frames: HashMap::new(),
            next_frame: 0,
            max_frames,
            tables: HashMap::new(),
        }
    }

    /// Gives `env` an empty page table
    pub fn create(&mut self, env: EnvId) {
        self.tables.entry(env).or_default();
    }

    /// Drops every mapping `env` holds, then its page table
    pub fn destroy(&mut self, env: EnvId) {
        if let Some(table) = self.tables.remove(&env) {
            for mapping in table.into_values() {
                self.release(mapping.frame);
            }
        }
    }

    /// Maps a fresh zeroed frame at `va`
    ///
    /// The frame is allocated before the old mapping (if any) is dropped, so
    /// a full frame table leaves the old mapping in place.
    pub fn alloc(&mut self, env: EnvId, va: VirtAddr, perm: PagePerm) -> Result<FrameId, KernelError> {
        if !self.tables.contains_key(&env) {
            return Err(KernelError::BadEnv(env));
        }
        if self.frames.len() >= self.max_frames {
            return Err(KernelError::NoMemory);
        }
        let frame = FrameId(self.next_frame);
        self.next_frame += 1;
        self.frames.insert(
            frame,
            Frame {
                data: Box::new([0u8; PAGE_SIZE]),
                refs: 0,
            },
        );
        self.insert(env, va, Mapping { frame, perm })?;
        Ok(frame)
    }

    /// Installs `mapping` at `va`, replacing what was there
    pub fn insert(&mut self, env: EnvId, va: VirtAddr, mapping: Mapping) -> Result<(), KernelError> {
        let table = self.tables.get_mut(&env).ok_or(KernelError::BadEnv(env))?;
        let frame = self
            .frames
            .get_mut(&mapping.frame)
            .ok_or_else(|| KernelError::InvalidArgument(format!("{} is not allocated", mapping.frame)))?;
        // Take the new reference first: remapping a page onto itself must not
        // free the frame in between.
        frame.refs += 1;
        if let Some(old) = table.insert(va, mapping) {
            self.release(old.frame);
        }
        Ok(())
    }

    /// Removes the mapping at `va`, if any
    pub fn unmap(&mut self, env: EnvId, va: VirtAddr) {
        let old = self.tables.get_mut(&env).and_then(|table| table.remove(&va));
        if let Some(old) = old {
            self.release(old.frame);
        }
    }

    pub fn lookup(&self, env: EnvId, va: VirtAddr) -> Option<Mapping> {
        self.tables.get(&env)?.get(&va).copied()
    }

    /// Copies out of the page mapped at `va`
    pub fn read(&self, env: EnvId, va: VirtAddr, offset: usize, out: &mut [u8]) -> Result<(), KernelError> {
        let range = Self::range(offset, out.len())?;
        let mapping = self.mapped(env, va)?;
        let frame = self.frames.get(&mapping.frame).ok_or(KernelError::NoMemory)?;
        out.copy_from_slice(&frame.data[range]);
        Ok(())
    }

    /// Copies into the page mapped at `va`; the mapping must be writable
    pub fn write(&mut self, env: EnvId, va: VirtAddr, offset: usize, data: &[u8]) -> Result<(), KernelError> {
        let range = Self::range(offset, data.len())?;
        let mapping = self.mapped(env, va)?;
        if !mapping.perm.is_writable() {
            return Err(KernelError::InvalidArgument(format!("page at {} is read-only", va)));
        }
        let frame = self
            .frames
            .get_mut(&mapping.frame)
            .ok_or(KernelError::NoMemory)?;
        frame.data[range].copy_from_slice(data);
        Ok(())
    }

    /// Frames currently allocated
    pub fn frames_in_use(&self) -> usize {
        self.frames.len()
    }

    /// Mappings currently referencing `frame`
    pub fn refcount(&self, frame: FrameId) -> usize {
        self.frames.get(&frame).map_or(0, |f| f.refs)
    }

    /// Number of pages mapped by `env`
    pub fn mapped_pages(&self, env: EnvId) -> usize {
        self.tables.get(&env).map_or(0, BTreeMap::len)
    }

    fn mapped(&self, env: EnvId, va: VirtAddr) -> Result<Mapping, KernelError> {
        self.lookup(env, va)
            .ok_or_else(|| KernelError::InvalidArgument(format!("no page mapped at {}", va)))
    }

    fn range(offset: usize, len: usize) -> Result<std::ops::Range<usize>, KernelError> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(offset..end),
            _ => Err(KernelError::InvalidArgument(format!(
                "access of {} bytes at offset {} crosses the page",
                len, offset
            ))),
        }
    }

    fn release(&mut self, frame: FrameId) {
        let freed = match self.frames.get_mut(&frame) {
            Some(f) => {
                f.refs = f.refs.saturating_sub(1);
                f.refs == 0
            }
            None => false,
        };
        if freed {
            self.frames.remove(&frame);
        }
    }
}

impl PageTransfer for AddressSpaces {
    fn lookup(&self, env: EnvId, va: VirtAddr) -> Option<PagePerm> {
        AddressSpaces::lookup(self, env, va).map(|m| m.perm)
    }

    fn alias(
        &mut self,
        src: (EnvId, VirtAddr),
        dst: (EnvId, VirtAddr),
        perm: PagePerm,
    ) -> Result<(), IpcError> {
        let mapping = AddressSpaces::lookup(self, src.0, src.1)
            .ok_or(IpcError::InvalidArgument("source page not mapped"))?;
        self.insert(
            dst.0,
            dst.1,
            Mapping {
                frame: mapping.frame,
                perm,
            },
        )
        .map_err(|_| IpcError::InvalidArgument("receiver has no address space"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VA: VirtAddr = VirtAddr::new(0x1000);
    const VB: VirtAddr = VirtAddr::new(0x2000);

    fn memory_with(envs: &[EnvId], max_frames: usize) -> AddressSpaces {
        let mut memory = AddressSpaces::new(max_frames);
        for env in envs {
            memory.create(*env);
        }
        memory
    }

    #[test]
    fn test_alloc_is_zeroed_and_replaces() {
        let env = EnvId::new();
        let mut memory = memory_with(&[env], 4);

        memory.alloc(env, VA, PagePerm::USER_WRITE).unwrap();
        memory.write(env, VA, 0, b"dirty").unwrap();
        memory.alloc(env, VA, PagePerm::USER_WRITE).unwrap();

        let mut out = [0xFFu8; 5];
        memory.read(env, VA, 0, &mut out).unwrap();
        assert_eq!(out, [0u8; 5]);
        assert_eq!(memory.frames_in_use(), 1);
    }

    #[test]
    fn test_frame_exhaustion() {
        let env = EnvId::new();
        let mut memory = memory_with(&[env], 1);

        memory.alloc(env, VA, PagePerm::USER_WRITE).unwrap();
        assert_eq!(
            memory.alloc(env, VB, PagePerm::USER_WRITE),
            Err(KernelError::NoMemory)
        );
        // A failed replacement keeps the old page.
        assert_eq!(
            memory.alloc(env, VA, PagePerm::USER_WRITE),
            Err(KernelError::NoMemory)
        );
        assert!(memory.lookup(env, VA).is_some());

        memory.unmap(env, VA);
        assert_eq!(memory.frames_in_use(), 0);
        assert!(memory.alloc(env, VB, PagePerm::USER_WRITE).is_ok());
    }

    #[test]
    fn test_alias_shares_frame() {
        let (a, b) = (EnvId::new(), EnvId::new());
        let mut memory = memory_with(&[a, b], 4);
        let frame = memory.alloc(a, VA, PagePerm::USER_WRITE).unwrap();

        memory.alias((a, VA), (b, VB), PagePerm::USER_WRITE).unwrap();
        assert_eq!(memory.refcount(frame), 2);

        memory.write(b, VB, 100, b"from b").unwrap();
        let mut out = [0u8; 6];
        memory.read(a, VA, 100, &mut out).unwrap();
        assert_eq!(&out, b"from b");

        memory.destroy(a);
        assert_eq!(memory.refcount(frame), 1);
        memory.read(b, VB, 100, &mut out).unwrap();
        assert_eq!(&out, b"from b");
    }

    #[test]
    fn test_alias_failures_are_invalid_arguments() {
        let (a, b, gone) = (EnvId::new(), EnvId::new(), EnvId::new());
        let mut memory = memory_with(&[a, b], 4);
        let frame = memory.alloc(a, VA, PagePerm::USER_WRITE).unwrap();

        let unmapped = memory.alias((a, VB), (b, VB), PagePerm::USER_READ);
        assert_eq!(unmapped, Err(IpcError::InvalidArgument("source page not mapped")));
        let homeless = memory.alias((a, VA), (gone, VB), PagePerm::USER_READ);
        assert_eq!(
            homeless,
            Err(IpcError::InvalidArgument("receiver has no address space"))
        );

        assert!(!homeless.unwrap_err().is_retryable());
        assert_eq!(memory.refcount(frame), 1);
        assert_eq!(memory.frames_in_use(), 1);
    }

    #[test]
    fn test_read_only_mapping_refuses_writes() {
        let (a, b) = (EnvId::new(), EnvId::new());
        let mut memory = memory_with(&[a, b], 4);
        memory.alloc(a, VA, PagePerm::USER_WRITE).unwrap();
        memory.alias((a, VA), (b, VB), PagePerm::USER_READ).unwrap();

        assert!(matches!(
            memory.write(b, VB, 0, b"x"),
            Err(KernelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remap_onto_itself_keeps_frame() {
        let env = EnvId::new();
        let mut memory = memory_with(&[env], 4);
        let frame = memory.alloc(env, VA, PagePerm::USER_WRITE).unwrap();
        memory.write(env, VA, 0, b"keep").unwrap();

        memory
            .insert(env, VA, Mapping { frame, perm: PagePerm::USER_READ })
            .unwrap();
        assert_eq!(memory.refcount(frame), 1);

        let mut out = [0u8; 4];
        memory.read(env, VA, 0, &mut out).unwrap();
        assert_eq!(&out, b"keep");
    }

    #[test]
    fn test_access_must_stay_inside_page() {
        let env = EnvId::new();
        let mut memory = memory_with(&[env], 4);
        memory.alloc(env, VA, PagePerm::USER_WRITE).unwrap();

        assert!(memory.write(env, VA, PAGE_SIZE - 2, b"abc").is_err());
        assert!(memory.write(env, VA, PAGE_SIZE - 3, b"abc").is_ok());
        assert!(memory.read(env, VB, 0, &mut [0u8; 1]).is_err());
    }

    #[test]
    fn test_unmap_unmapped_is_silent() {
        let env = EnvId::new();
        let mut memory = memory_with(&[env], 4);
        memory.unmap(env, VA);
        assert_eq!(memory.mapped_pages(env), 0);
    }
}
