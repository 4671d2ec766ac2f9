//! Network relays for the user-level network stack.
//!
//! Two small processes sit between the driver and the stack:
//!
//! - [`InputRelay`] polls the receive ring and hands each frame to the stack
//!   in a fresh page tagged [`NetRequest::Input`](ipc::NetRequest::Input).
//! - [`OutputRelay`] waits for [`NetRequest::Output`](ipc::NetRequest::Output)
//!   pages from the stack and queues them on the transmit ring.
//!
//! Both loops hold the only retry policy in the pipeline: transient errors
//! are retried after a yield, anything else ends the relay.

pub mod error;
pub mod input;
pub mod output;
pub mod retry;

#[cfg(test)]
mod mock;

use core_types::VirtAddr;

pub use error::RelayError;
pub use input::InputRelay;
pub use output::{Discarded, OutputRelay, Served};
pub use retry::retry_with_yield;

/// Where a relay keeps its request page
pub const REQUEST_PAGE: VirtAddr = VirtAddr::new(0x0FFF_F000);

/// Largest frame the input relay accepts from the driver
pub const MAX_RX_FRAME: usize = 2048;
