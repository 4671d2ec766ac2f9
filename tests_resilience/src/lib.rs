//! Resilience Test Utilities
//!
//! Shared setup for end-to-end tests of the network pipeline.
//!
//! ## Test Philosophy
//!
//! - **One process at a time**: the test drives one relay as a process; the
//!   stack and the wire are played from the kernel's yield hook.
//! - **Backpressure is observable**: every wait is a yield, so a test can
//!   make progress happen on exactly the yield it wants.
//! - **Stalls end tests**: a relay that waits forever fails with
//!   `Stalled` instead of hanging.

use core_types::{EnvId, PagePerm, VirtAddr, PAGE_SIZE};
use hal_e1000::{E1000Config, NicError};
use ipc::{IpcReceipt, NetRequest, PacketPage};
use kernel_api::KernelError;
use services_network::RelayError;
use sim_kernel::test_utils::{complete_transmits, Wire};
use sim_kernel::{SimConfig, SimulatedKernel};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Where the stack receives input pages
pub const STACK_RX_PAGE: VirtAddr = VirtAddr::new(0x00A0_0000);

/// Where the stack builds output pages
pub const STACK_TX_PAGE: VirtAddr = VirtAddr::new(0x00B0_0000);

/// Sets up logging once per test binary
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A kernel with a device, a relay process and a stack process
pub struct Pipeline {
    pub kernel: SimulatedKernel,
    pub stack: EnvId,
    pub relay: EnvId,
}

impl Pipeline {
    /// Builds a pipeline with the default kernel and device settings
    pub fn new() -> Result<Self, NicError> {
        Self::with_config(SimConfig::default(), E1000Config::default())
    }

    pub fn with_config(sim: SimConfig, nic: E1000Config) -> Result<Self, NicError> {
        init_logging();
        let mut kernel = SimulatedKernel::with_config(sim);
        kernel.attach_nic(nic)?;
        let stack = kernel.create_env();
        let relay = kernel.create_env();
        Ok(Self {
            kernel,
            stack,
            relay,
        })
    }

    /// Blocks the stack in a receive at [`STACK_RX_PAGE`]
    pub fn arm_stack(&mut self) -> Result<(), KernelError> {
        arm_stack(&mut self.kernel, self.stack)
    }

    pub fn stack_receipt(&mut self) -> Result<Option<IpcReceipt>, KernelError> {
        self.kernel.sys_ipc_take_receipt(self.stack)
    }

    /// The frame in the stack's input page
    pub fn stack_frame(&self) -> Result<Vec<u8>, RelayError> {
        read_packet(&self.kernel, self.stack, STACK_RX_PAGE)
    }
}

/// Blocks `stack` in a receive at [`STACK_RX_PAGE`]
pub fn arm_stack(kernel: &mut SimulatedKernel, stack: EnvId) -> Result<(), KernelError> {
    kernel.sys_ipc_recv_begin(stack, Some(STACK_RX_PAGE))
}

/// Decodes the packet page `env` has mapped at `va`
pub fn read_packet(kernel: &SimulatedKernel, env: EnvId, va: VirtAddr) -> Result<Vec<u8>, RelayError> {
    let mut page = vec![0u8; PAGE_SIZE];
    kernel.sys_copy_from_page(env, va, 0, &mut page)?;
    Ok(PacketPage::decode(&page)?.to_vec())
}

/// Plays `sender` handing `frame` to the output relay
///
/// Fails with `NotReceiving` when the relay is not waiting.
pub fn stack_send_output(
    kernel: &mut SimulatedKernel,
    sender: EnvId,
    relay: EnvId,
    frame: &[u8],
) -> Result<(), RelayError> {
    kernel.sys_page_alloc(sender, STACK_TX_PAGE, PagePerm::USER_WRITE)?;
    let mut page = vec![0u8; PAGE_SIZE];
    PacketPage::encode(&mut page, frame)?;
    kernel.sys_copy_to_page(sender, STACK_TX_PAGE, 0, &page)?;
    kernel.sys_ipc_try_send(
        sender,
        relay,
        NetRequest::Output.value(),
        Some(STACK_TX_PAGE),
        PagePerm::USER_WRITE,
    )?;
    log::trace!("stack: handed {} bytes to output", frame.len());
    Ok(())
}

/// What the played stack observed
pub struct PlayedStack {
    /// Frames the device put on the wire
    pub wire: Wire,
    /// Yields taken while the relay was not receiving
    pub ring_waits: Rc<Cell<usize>>,
}

/// Plays the stack and the wire from the yield hook
///
/// Whenever the relay is waiting in a receive, the next pending frame is
/// handed to it. Any other yield lets the device drain the transmit ring,
/// so a relay stuck on a full ring sees room appear.
pub fn play_stack(
    kernel: &mut SimulatedKernel,
    stack: EnvId,
    relay: EnvId,
    frames: Vec<Vec<u8>>,
) -> PlayedStack {
    let wire: Wire = Rc::new(RefCell::new(Vec::new()));
    let ring_waits = Rc::new(Cell::new(0));
    let (sink, waits) = (Rc::clone(&wire), Rc::clone(&ring_waits));
    let mut pending: VecDeque<Vec<u8>> = frames.into();

    kernel.set_yield_hook(move |k| {
        let receiving = k.endpoint(relay).is_some_and(|e| e.is_receiving());
        if receiving {
            if let Some(frame) = pending.pop_front() {
                if let Err(err) = stack_send_output(k, stack, relay, &frame) {
                    log::error!("stack: output send failed: {}", err);
                }
                return;
            }
        } else {
            waits.set(waits.get() + 1);
        }
        sink.borrow_mut().extend(complete_transmits(k));
    });

    PlayedStack { wire, ring_waits }
}
