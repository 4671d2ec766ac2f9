//! # Intel 82540EM (e1000) Driver
//!
//! Polled transmit and receive over fixed-capacity DMA descriptor rings.
//!
//! ## Philosophy
//!
//! - **Ownership is observed, never assumed**: a slot belongs to software only
//!   while its done bit says so. Timing is never trusted.
//! - **Report, don't wait**: a full transmit ring or an empty receive ring is
//!   an error value, not a spin. Retry policy belongs to the caller.
//! - **One owner**: [`E1000`] owns its rings and its register window. There is
//!   no global device handle.
//!
//! ## Architecture
//!
//! - [`regs`]: the Device Register Interface (offsets, control words)
//! - [`ring`]: the generic descriptor ring shared by both directions
//! - [`tx`] / [`rx`]: the Transmit and Receive Engines
//! - [`driver`]: attach-time bring-up and the process-facing operations
//! - [`sim`]: a device model that plays the DMA engine in simulation
//!
//! ## Non-Goals
//!
//! - Multi-descriptor (jumbo) frames
//! - Interrupts
//! - More than one device

pub mod config;
mod descriptor;
pub mod driver;
pub mod error;
pub mod regs;
pub mod ring;
pub mod rx;
pub mod sim;
pub mod tx;

pub use config::{E1000Config, MacAddress};
pub use driver::{E1000, E1000_STATUS_EXPECTED};
pub use error::NicError;
pub use regs::{InterPacketGap, ReceiveControl, Registers, RingRegisters, TransmitControl};
pub use rx::{RxRing, RxSlot, RX_BUFFER_SIZE, RX_RING_SIZE};
pub use sim::{SimulatedDevice, SimulatedNic, REGISTER_WINDOW_SIZE};
pub use tx::{TxRing, TxSlot, TX_PACKET_SIZE, TX_RING_SIZE};
