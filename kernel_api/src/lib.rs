//! # Kernel API
//!
//! This crate defines the interface between user-level processes and the
//! kernel, limited to what the network relays need.
//!
//! ## Philosophy
//!
//! The kernel provides **mechanisms**, not policies:
//! - Page allocation and mapping (not implicit sharing)
//! - Rendezvous IPC (not buffered channels)
//! - Non-blocking device access (the caller decides when to retry)
//! - An explicit yield (the only suspension point)
//!
//! ## Design Goals
//!
//! 1. **Testability**: every operation is a trait method, so a relay can run
//!    against the simulated kernel or a hand-written mock
//! 2. **Honest errors**: backpressure is a value the caller sees, never a
//!    hidden spin inside the kernel
//!
//! ## Non-Goals
//!
//! This is NOT:
//! - POSIX (no fork, exec, signals, files)
//! - A syscall ABI (no numbers, no register conventions)

pub mod error;
pub mod syscalls;

pub use error::KernelError;
pub use syscalls::Syscalls;
