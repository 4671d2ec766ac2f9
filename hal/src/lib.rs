//! # Hardware Abstraction Layer (HAL)
//!
//! This crate defines the hardware-access seams device drivers are written
//! against.
//!
//! ## Philosophy
//!
//! **Devices must be drivable without the device.**
//!
//! Drivers never dereference a raw register pointer themselves. They go
//! through [`MmioWindow`], which has a volatile implementation for real
//! hardware and a shared in-memory implementation for simulation.
//!
//! ## Design Principles
//!
//! 1. **Trait-based**: All register traffic goes through traits
//! 2. **Minimal unsafe**: Raw pointers live in two small modules
//! 3. **Testable**: The simulated register file is shared with a device model

pub mod dma;
pub mod mmio;

pub use dma::{DmaError, DmaRegion, DmaSafe, DMA_ALIGN};
pub use mmio::{MmioError, MmioWindow, RegisterFile, VolatileMmio};
