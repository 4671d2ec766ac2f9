//! Test utilities for pipeline tests
//!
//! Helpers that build a kernel with a network device and let tests play
//! the wire.

use crate::SimulatedKernel;
use hal_e1000::{E1000Config, NicError};
use std::cell::RefCell;
use std::rc::Rc;

/// Frames the device has put on the wire, shared with a yield hook
pub type Wire = Rc<RefCell<Vec<Vec<u8>>>>;

/// Creates a kernel with a simulated e1000 attached
pub fn kernel_with_nic(config: E1000Config) -> Result<SimulatedKernel, NicError> {
    let mut kernel = SimulatedKernel::new();
    kernel.attach_nic(config)?;
    Ok(kernel)
}

/// Lets the device drain the transmit ring once
///
/// Returns nothing when no device is attached.
pub fn complete_transmits(kernel: &mut SimulatedKernel) -> Vec<Vec<u8>> {
    kernel
        .nic_mut()
        .map(|nic| nic.complete_transmits())
        .unwrap_or_default()
}

/// Delivers frames from the wire; returns how many the device accepted
pub fn inject_frames<'a, I>(kernel: &mut SimulatedKernel, frames: I) -> usize
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let Some(nic) = kernel.nic_mut() else {
        return 0;
    };
    frames
        .into_iter()
        .filter(|frame| nic.inject_frame(frame))
        .count()
}

/// Installs a yield hook that plays the transmit side of the device
///
/// Every yield drains the transmit ring into the returned wire.
pub fn capture_wire(kernel: &mut SimulatedKernel) -> Wire {
    let wire: Wire = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&wire);
    kernel.set_yield_hook(move |k| {
        let frames = complete_transmits(k);
        sink.borrow_mut().extend(frames);
    });
    wire
}
