//! Scripted system calls for relay unit tests

use core_types::{EnvId, PagePerm, VirtAddr, PAGE_SIZE};
use ipc::IpcReceipt;
use kernel_api::{KernelError, Syscalls};
use std::collections::{HashMap, VecDeque};

/// Yields allowed before the mock reports a stall
const YIELD_LIMIT: usize = 100;

pub(crate) struct MockSyscalls {
    pub env: EnvId,
    pub yields: usize,
    /// Results for `net_try_receive`; an empty queue reads as an empty ring
    pub rx: VecDeque<Result<Vec<u8>, KernelError>>,
    /// Failures returned by `page_alloc` before it succeeds
    pub alloc_failures: VecDeque<KernelError>,
    pub allocs: usize,
    /// Failures returned by `ipc_try_send` before it succeeds
    pub send_failures: VecDeque<KernelError>,
    pub sent: Vec<(EnvId, u32, Option<VirtAddr>, PagePerm)>,
    /// Messages for `ipc_recv`, each with the page contents it carries
    pub inbox: VecDeque<(IpcReceipt, Option<Vec<u8>>)>,
    /// Failures returned by `net_try_transmit` before it succeeds
    pub tx_failures: VecDeque<KernelError>,
    pub transmitted: Vec<Vec<u8>>,
    pub pages: HashMap<VirtAddr, Vec<u8>>,
}

impl MockSyscalls {
    pub fn new() -> Self {
        Self {
            env: EnvId::new(),
            yields: 0,
            rx: VecDeque::new(),
            alloc_failures: VecDeque::new(),
            allocs: 0,
            send_failures: VecDeque::new(),
            sent: Vec::new(),
            inbox: VecDeque::new(),
            tx_failures: VecDeque::new(),
            transmitted: Vec::new(),
            pages: HashMap::new(),
        }
    }

    fn stalled(&self) -> KernelError {
        KernelError::Stalled {
            env: self.env,
            yields: self.yields as u64,
        }
    }

    fn page(&self, va: VirtAddr) -> Result<&Vec<u8>, KernelError> {
        self.pages
            .get(&va)
            .ok_or_else(|| KernelError::InvalidArgument(format!("no page at {}", va)))
    }
}

impl Syscalls for MockSyscalls {
    fn env_id(&self) -> EnvId {
        self.env
    }

    fn yield_now(&mut self) -> Result<(), KernelError> {
        self.yields += 1;
        if self.yields > YIELD_LIMIT {
            return Err(self.stalled());
        }
        Ok(())
    }

    fn page_alloc(&mut self, va: VirtAddr, _perm: PagePerm) -> Result<(), KernelError> {
        if let Some(err) = self.alloc_failures.pop_front() {
            return Err(err);
        }
        self.allocs += 1;
        self.pages.insert(va, vec![0u8; PAGE_SIZE]);
        Ok(())
    }

    fn page_map(
        &mut self,
        _src: VirtAddr,
        _dst_env: EnvId,
        _dst: VirtAddr,
        _perm: PagePerm,
    ) -> Result<(), KernelError> {
        Ok(())
    }

    fn page_unmap(&mut self, va: VirtAddr) -> Result<(), KernelError> {
        self.pages.remove(&va);
        Ok(())
    }

    fn ipc_try_send(
        &mut self,
        target: EnvId,
        value: u32,
        page: Option<VirtAddr>,
        perm: PagePerm,
    ) -> Result<(), KernelError> {
        if let Some(err) = self.send_failures.pop_front() {
            return Err(err);
        }
        self.sent.push((target, value, page, perm));
        Ok(())
    }

    fn ipc_recv(&mut self, dst: Option<VirtAddr>) -> Result<IpcReceipt, KernelError> {
        let (receipt, contents) = self.inbox.pop_front().ok_or_else(|| self.stalled())?;
        if let (Some(dst), Some(contents)) = (dst, contents) {
            self.pages.insert(dst, contents);
        }
        Ok(receipt)
    }

    fn net_try_transmit(&mut self, frame: &[u8]) -> Result<(), KernelError> {
        if let Some(err) = self.tx_failures.pop_front() {
            return Err(err);
        }
        self.transmitted.push(frame.to_vec());
        Ok(())
    }

    fn net_try_receive(&mut self, out: &mut [u8]) -> Result<usize, KernelError> {
        match self.rx.pop_front() {
            None => Err(KernelError::RingEmpty),
            Some(Err(err)) => Err(err),
            Some(Ok(frame)) => {
                let len = frame.len().min(out.len());
                out[..len].copy_from_slice(&frame[..len]);
                Ok(len)
            }
        }
    }

    fn copy_to_page(&mut self, va: VirtAddr, offset: usize, data: &[u8]) -> Result<(), KernelError> {
        let page = self
            .pages
            .get_mut(&va)
            .ok_or_else(|| KernelError::InvalidArgument(format!("no page at {}", va)))?;
        page[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn copy_from_page(&self, va: VirtAddr, offset: usize, out: &mut [u8]) -> Result<(), KernelError> {
        let page = self.page(va)?;
        let end = (offset + out.len()).min(page.len());
        let len = end.saturating_sub(offset);
        out[..len].copy_from_slice(&page[offset..end]);
        Ok(())
    }
}
