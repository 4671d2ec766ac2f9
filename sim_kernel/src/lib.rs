//! # Simulated Kernel
//!
//! This crate provides a simulated implementation of the kernel API.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing the packet pipeline without hardware:
//! - Runs under `cargo test`
//! - Deterministic (no real concurrency, a yield runs a test-supplied hook)
//! - Inspectable (page tables, endpoints and the IPC audit log are public)
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! This is not a "toy" or "mock": page frames are real memory shared by
//! aliasing, the rendezvous rules are the real ones, and the network device
//! is the real driver running against a device model.
//!
//! ## Model
//!
//! Privileged operations are `sys_*` methods taking the calling context
//! explicitly. A process sees them through [`EnvContext`], which implements
//! [`kernel_api::Syscalls`] for one context.

pub mod address_space;
pub mod config;
pub mod ipc_audit;
pub mod test_utils;

use address_space::AddressSpaces;
pub use config::SimConfig;
use core_types::{EnvId, PagePerm, VirtAddr};
use hal_e1000::{E1000Config, NicError, SimulatedNic};
use ipc::{Endpoint, IpcReceipt, IpcSend, PageGrant};
use ipc_audit::{IpcAuditLog, IpcEvent};
use kernel_api::{KernelError, Syscalls};
use std::collections::HashMap;
use std::fmt;

/// Scheduler stand-in run on every yield
///
/// Tests use it to play the device or a peer process.
pub type YieldHook = Box<dyn FnMut(&mut SimulatedKernel)>;

/// Why a context stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The process returned
    Normal,
    /// The process returned an error
    Error(String),
}

/// Scheduling status of a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvStatus {
    Runnable,
    /// Blocked in an IPC receive
    NotRunnable,
    Exited(ExitReason),
}

struct Env {
    status: EnvStatus,
    endpoint: Endpoint,
    idle_yields: u64,
}

/// Simulated kernel state
///
/// Unlike a real kernel, this state is directly accessible for testing.
pub struct SimulatedKernel {
    config: SimConfig,
    envs: HashMap<EnvId, Env>,
    memory: AddressSpaces,
    nic: Option<SimulatedNic>,
    yield_hook: Option<YieldHook>,
    ipc_audit: IpcAuditLog,
}

impl SimulatedKernel {
    /// Creates a kernel with the default configuration
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Self {
            memory: AddressSpaces::new(config.max_frames),
            config,
            envs: HashMap::new(),
            nic: None,
            yield_hook: None,
            ipc_audit: IpcAuditLog::new(),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Creates a runnable context with an empty address space
    pub fn create_env(&mut self) -> EnvId {
        let env = EnvId::new();
        self.envs.insert(
            env,
            Env {
                status: EnvStatus::Runnable,
                endpoint: Endpoint::new(),
                idle_yields: 0,
            },
        );
        self.memory.create(env);
        log::trace!("sim kernel: created {}", env);
        env
    }

    /// Marks a context exited and frees its pages
    pub fn exit_env(&mut self, env: EnvId, reason: ExitReason) -> Result<(), KernelError> {
        let entry = self.live_env_mut(env)?;
        entry.status = EnvStatus::Exited(reason.clone());
        entry.endpoint.cancel();
        self.memory.destroy(env);
        match reason {
            ExitReason::Normal => log::debug!("sim kernel: {} exited", env),
            ExitReason::Error(err) => log::error!("sim kernel: {} exited: {}", env, err),
        }
        Ok(())
    }

    pub fn env_status(&self, env: EnvId) -> Option<EnvStatus> {
        self.envs.get(&env).map(|e| e.status.clone())
    }

    /// The context's rendezvous endpoint
    pub fn endpoint(&self, env: EnvId) -> Option<&Endpoint> {
        self.envs.get(&env).map(|e| &e.endpoint)
    }

    pub fn memory(&self) -> &AddressSpaces {
        &self.memory
    }

    pub fn ipc_audit(&self) -> &IpcAuditLog {
        &self.ipc_audit
    }

    /// Attaches the network driver to a fresh simulated e1000
    pub fn attach_nic(&mut self, config: E1000Config) -> Result<(), NicError> {
        self.nic = Some(SimulatedNic::attach(config)?);
        Ok(())
    }

    /// Installs an already attached device
    pub fn install_nic(&mut self, nic: SimulatedNic) {
        self.nic = Some(nic);
    }

    pub fn nic(&self) -> Option<&SimulatedNic> {
        self.nic.as_ref()
    }

    pub fn nic_mut(&mut self) -> Option<&mut SimulatedNic> {
        self.nic.as_mut()
    }

    /// Sets the hook run on every yield
    pub fn set_yield_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut SimulatedKernel) + 'static,
    {
        self.yield_hook = Some(Box::new(hook));
    }

    pub fn clear_yield_hook(&mut self) {
        self.yield_hook = None;
    }

    /// A process-facing handle for `env`
    pub fn context(&mut self, env: EnvId) -> Result<EnvContext<'_>, KernelError> {
        self.live_env(env)?;
        Ok(EnvContext { kernel: self, env })
    }

    /// Runs `body` as process `env` and records how it ended
    pub fn run_process<T, E, F>(&mut self, env: EnvId, body: F) -> Result<Result<T, E>, KernelError>
    where
        E: fmt::Display,
        F: FnOnce(&mut EnvContext<'_>) -> Result<T, E>,
    {
        let outcome = {
            let mut ctx = self.context(env)?;
            body(&mut ctx)
        };
        let reason = match &outcome {
            Ok(_) => ExitReason::Normal,
            Err(err) => ExitReason::Error(err.to_string()),
        };
        self.exit_env(env, reason)?;
        Ok(outcome)
    }

    /// Gives up the processor on behalf of `caller`
    pub fn sys_yield(&mut self, caller: EnvId) -> Result<(), KernelError> {
        let limit = self.config.max_idle_yields;
        let entry = self.live_env_mut(caller)?;
        entry.idle_yields += 1;
        let yields = entry.idle_yields;
        if limit.is_some_and(|max| yields > max) {
            log::warn!("sim kernel: {} stalled after {} yields", caller, yields - 1);
            return Err(KernelError::Stalled {
                env: caller,
                yields: yields - 1,
            });
        }

        if let Some(mut hook) = self.yield_hook.take() {
            hook(self);
            if self.yield_hook.is_none() {
                self.yield_hook = Some(hook);
            }
        }
        Ok(())
    }

    pub fn sys_page_alloc(&mut self, caller: EnvId, va: VirtAddr, perm: PagePerm) -> Result<(), KernelError> {
        log::trace!("sim kernel: {} page_alloc {} [{}]", caller, va, perm);
        self.live_env(caller)?;
        check_user_page(va)?;
        check_perm(perm)?;
        self.memory.alloc(caller, va, perm)?;
        self.progress(caller);
        Ok(())
    }

    pub fn sys_page_map(
        &mut self,
        caller: EnvId,
        src: VirtAddr,
        dst_env: EnvId,
        dst: VirtAddr,
        perm: PagePerm,
    ) -> Result<(), KernelError> {
        log::trace!("sim kernel: {} page_map {} -> {}:{} [{}]", caller, src, dst_env, dst, perm);
        self.live_env(caller)?;
        self.live_env(dst_env)?;
        check_user_page(src)?;
        check_user_page(dst)?;
        check_perm(perm)?;
        let mapping = self
            .memory
            .lookup(caller, src)
            .ok_or_else(|| KernelError::InvalidArgument(format!("no page mapped at {}", src)))?;
        if perm.is_writable() && !mapping.perm.is_writable() {
            return Err(KernelError::InvalidArgument(format!(
                "page at {} is read-only",
                src
            )));
        }
        self.memory.insert(
            dst_env,
            dst,
            address_space::Mapping {
                frame: mapping.frame,
                perm,
            },
        )?;
        self.progress(caller);
        Ok(())
    }

    pub fn sys_page_unmap(&mut self, caller: EnvId, va: VirtAddr) -> Result<(), KernelError> {
        log::trace!("sim kernel: {} page_unmap {}", caller, va);
        self.live_env(caller)?;
        check_user_page(va)?;
        self.memory.unmap(caller, va);
        self.progress(caller);
        Ok(())
    }

    /// Arms `caller`'s endpoint and blocks it
    pub fn sys_ipc_recv_begin(&mut self, caller: EnvId, dst: Option<VirtAddr>) -> Result<(), KernelError> {
        let entry = self.live_env_mut(caller)?;
        entry.endpoint.begin_receive(dst)?;
        entry.status = EnvStatus::NotRunnable;
        let dst = match entry.endpoint.state() {
            ipc::RecvState::Waiting { dst } => dst,
            ipc::RecvState::Idle => None,
        };
        log::trace!("sim kernel: {} waiting to receive", caller);
        self.ipc_audit.record(IpcEvent::Armed { env: caller, dst });
        Ok(())
    }

    /// Takes a completed delivery for `caller`, if any
    pub fn sys_ipc_take_receipt(&mut self, caller: EnvId) -> Result<Option<IpcReceipt>, KernelError> {
        let entry = self.live_env_mut(caller)?;
        let receipt = entry.endpoint.take_receipt();
        if receipt.is_some() {
            entry.idle_yields = 0;
        }
        Ok(receipt)
    }

    pub fn sys_ipc_try_send(
        &mut self,
        caller: EnvId,
        target: EnvId,
        value: u32,
        page: Option<VirtAddr>,
        perm: PagePerm,
    ) -> Result<(), KernelError> {
        self.live_env(caller)?;
        let send = IpcSend {
            from: caller,
            to: target,
            value,
            page: page.map(|va| PageGrant::new(va, perm)),
        };

        let result = match self.envs.get_mut(&target) {
            Some(entry) if !matches!(entry.status, EnvStatus::Exited(_)) => {
                match entry.endpoint.try_send(&mut self.memory, send) {
                    Ok(receipt) => {
                        entry.status = EnvStatus::Runnable;
                        Ok(receipt)
                    }
                    Err(err) => Err(KernelError::from(err)),
                }
            }
            _ => Err(KernelError::BadEnv(target)),
        };

        match result {
            Ok(receipt) => {
                self.ipc_audit.record(IpcEvent::Delivered {
                    from: caller,
                    to: target,
                    value,
                    perm: receipt.perm,
                });
                self.progress(caller);
                Ok(())
            }
            Err(error) => {
                log::trace!("sim kernel: {} -> {} send failed: {}", caller, target, error);
                self.ipc_audit.record(IpcEvent::Rejected {
                    from: caller,
                    to: target,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    pub fn sys_net_try_transmit(&mut self, caller: EnvId, frame: &[u8]) -> Result<(), KernelError> {
        self.live_env(caller)?;
        let nic = self.nic.as_mut().ok_or(KernelError::NoDevice)?;
        nic.transmit(frame).map_err(nic_error)?;
        self.progress(caller);
        Ok(())
    }

    pub fn sys_net_try_receive(&mut self, caller: EnvId, out: &mut [u8]) -> Result<usize, KernelError> {
        self.live_env(caller)?;
        let nic = self.nic.as_mut().ok_or(KernelError::NoDevice)?;
        let len = nic.receive(out).map_err(nic_error)?;
        self.progress(caller);
        Ok(len)
    }

    pub fn sys_copy_to_page(
        &mut self,
        caller: EnvId,
        va: VirtAddr,
        offset: usize,
        data: &[u8],
    ) -> Result<(), KernelError> {
        self.live_env(caller)?;
        self.memory.write(caller, va, offset, data)
    }

    pub fn sys_copy_from_page(
        &self,
        caller: EnvId,
        va: VirtAddr,
        offset: usize,
        out: &mut [u8],
    ) -> Result<(), KernelError> {
        self.live_env(caller)?;
        self.memory.read(caller, va, offset, out)
    }

    fn live_env(&self, env: EnvId) -> Result<&Env, KernelError> {
        match self.envs.get(&env) {
            Some(entry) if !matches!(entry.status, EnvStatus::Exited(_)) => Ok(entry),
            _ => Err(KernelError::BadEnv(env)),
        }
    }

    fn live_env_mut(&mut self, env: EnvId) -> Result<&mut Env, KernelError> {
        match self.envs.get_mut(&env) {
            Some(entry) if !matches!(entry.status, EnvStatus::Exited(_)) => Ok(entry),
            _ => Err(KernelError::BadEnv(env)),
        }
    }

    /// Resets the stall guard after a system call that did something
    fn progress(&mut self, env: EnvId) {
        if let Some(entry) = self.envs.get_mut(&env) {
            entry.idle_yields = 0;
        }
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn check_user_page(va: VirtAddr) -> Result<(), KernelError> {
    if !va.is_user() || !va.is_page_aligned() {
        return Err(KernelError::InvalidArgument(format!(
            "{} is not a page-aligned user address",
            va
        )));
    }
    Ok(())
}

fn check_perm(perm: PagePerm) -> Result<(), KernelError> {
    if !PagePerm::is_valid_for_syscall(perm.bits()) {
        return Err(KernelError::InvalidArgument(format!(
            "invalid permission {:#x}",
            perm.bits()
        )));
    }
    Ok(())
}

fn nic_error(err: NicError) -> KernelError {
    match err {
        NicError::PacketTooLong { len, max } => KernelError::PacketTooLong { len, max },
        NicError::RingFull => KernelError::RingFull,
        NicError::RingEmpty => KernelError::RingEmpty,
        NicError::UnsupportedFraming { index } => KernelError::UnsupportedFraming { index },
        NicError::DeviceIdentity { expected, found } => {
            KernelError::DeviceIdentity { expected, found }
        }
        other => {
            log::error!("sim kernel: network device failed: {}", other);
            KernelError::NoDevice
        }
    }
}

/// One process's view of the kernel
pub struct EnvContext<'k> {
    kernel: &'k mut SimulatedKernel,
    env: EnvId,
}

impl EnvContext<'_> {
    /// The kernel behind this context
    pub fn kernel(&mut self) -> &mut SimulatedKernel {
        &mut *self.kernel
    }
}

impl Syscalls for EnvContext<'_> {
    fn env_id(&self) -> EnvId {
        self.env
    }

    fn yield_now(&mut self) -> Result<(), KernelError> {
        self.kernel.sys_yield(self.env)
    }

    fn page_alloc(&mut self, va: VirtAddr, perm: PagePerm) -> Result<(), KernelError> {
        self.kernel.sys_page_alloc(self.env, va, perm)
    }

    fn page_map(
        &mut self,
        src: VirtAddr,
        dst_env: EnvId,
        dst: VirtAddr,
        perm: PagePerm,
    ) -> Result<(), KernelError> {
        self.kernel.sys_page_map(self.env, src, dst_env, dst, perm)
    }

    fn page_unmap(&mut self, va: VirtAddr) -> Result<(), KernelError> {
        self.kernel.sys_page_unmap(self.env, va)
    }

    fn ipc_try_send(
        &mut self,
        target: EnvId,
        value: u32,
        page: Option<VirtAddr>,
        perm: PagePerm,
    ) -> Result<(), KernelError> {
        self.kernel
            .sys_ipc_try_send(self.env, target, value, page, perm)
    }

    fn ipc_recv(&mut self, dst: Option<VirtAddr>) -> Result<IpcReceipt, KernelError> {
        self.kernel.sys_ipc_recv_begin(self.env, dst)?;
        loop {
            if let Some(receipt) = self.kernel.sys_ipc_take_receipt(self.env)? {
                return Ok(receipt);
            }
            self.kernel.sys_yield(self.env)?;
        }
    }

    fn net_try_transmit(&mut self, frame: &[u8]) -> Result<(), KernelError> {
        self.kernel.sys_net_try_transmit(self.env, frame)
    }

    fn net_try_receive(&mut self, out: &mut [u8]) -> Result<usize, KernelError> {
        self.kernel.sys_net_try_receive(self.env, out)
    }

    fn copy_to_page(&mut self, va: VirtAddr, offset: usize, data: &[u8]) -> Result<(), KernelError> {
        self.kernel.sys_copy_to_page(self.env, va, offset, data)
    }

    fn copy_from_page(&self, va: VirtAddr, offset: usize, out: &mut [u8]) -> Result<(), KernelError> {
        self.kernel.sys_copy_from_page(self.env, va, offset, out)
    }
}
