//! The process-facing system-call surface

use crate::KernelError;
use core_types::{EnvId, PagePerm, VirtAddr};
use ipc::IpcReceipt;

/// System calls available to a user-level process
///
/// Every call is made on behalf of the process identified by [`env_id`].
/// Multiple implementations are possible:
/// - the simulated kernel (tests and the end-to-end pipeline)
/// - a real trap-based kernel
/// - hand-written mocks for unit tests of a single relay
///
/// Nothing here blocks except [`ipc_recv`] and [`yield_now`]; device and send
/// operations report backpressure as an error instead.
///
/// [`env_id`]: Syscalls::env_id
/// [`ipc_recv`]: Syscalls::ipc_recv
/// [`yield_now`]: Syscalls::yield_now
///
/// # Example
///
/// ```
/// use kernel_api::{KernelError, Syscalls};
///
/// fn send_until_accepted<S: Syscalls>(
///     sys: &mut S,
///     target: core_types::EnvId,
/// ) -> Result<(), KernelError> {
///     loop {
///         match sys.ipc_try_send(target, 1, None, core_types::PagePerm::empty()) {
///             Err(KernelError::NotReceiving) => sys.yield_now()?,
///             other => return other,
///         }
///     }
/// }
/// ```
pub trait Syscalls {
    /// The calling process
    fn env_id(&self) -> EnvId;

    /// Gives up the processor
    ///
    /// Other processes (and, in simulation, the device) run before this
    /// returns. Only the simulated kernel ever fails here.
    fn yield_now(&mut self) -> Result<(), KernelError>;

    /// Maps a fresh zeroed page at `va`, replacing any existing mapping
    fn page_alloc(&mut self, va: VirtAddr, perm: PagePerm) -> Result<(), KernelError>;

    /// Maps the caller's page at `src` into `dst_env` at `dst`
    ///
    /// `perm` may include writable only if the caller's mapping is writable.
    fn page_map(
        &mut self,
        src: VirtAddr,
        dst_env: EnvId,
        dst: VirtAddr,
        perm: PagePerm,
    ) -> Result<(), KernelError>;

    /// Removes the mapping at `va`; unmapping an unmapped page is not an error
    fn page_unmap(&mut self, va: VirtAddr) -> Result<(), KernelError>;

    /// Attempts one rendezvous with `target`
    ///
    /// `page` below `UTOP` offers the caller's page at that address with
    /// `perm`. Fails with [`KernelError::NotReceiving`] unless the target is
    /// blocked in [`ipc_recv`](Syscalls::ipc_recv).
    fn ipc_try_send(
        &mut self,
        target: EnvId,
        value: u32,
        page: Option<VirtAddr>,
        perm: PagePerm,
    ) -> Result<(), KernelError>;

    /// Blocks until some process sends to the caller
    ///
    /// `dst` below `UTOP` accepts a page there.
    fn ipc_recv(&mut self, dst: Option<VirtAddr>) -> Result<IpcReceipt, KernelError>;

    /// Queues one frame on the network device
    fn net_try_transmit(&mut self, frame: &[u8]) -> Result<(), KernelError>;

    /// Copies the next received frame into `out`, returning its length
    fn net_try_receive(&mut self, out: &mut [u8]) -> Result<usize, KernelError>;

    /// Stores `data` into the caller's page at `va`, starting at `offset`
    ///
    /// Stands in for plain stores through a user mapping; requires a
    /// writable mapping.
    fn copy_to_page(&mut self, va: VirtAddr, offset: usize, data: &[u8])
        -> Result<(), KernelError>;

    /// Loads from the caller's page at `va`, starting at `offset`
    fn copy_from_page(&self, va: VirtAddr, offset: usize, out: &mut [u8])
        -> Result<(), KernelError>;
}
