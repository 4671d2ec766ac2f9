//! # Core Types
//!
//! This crate defines the fundamental types shared by the driver, the
//! kernel and the user-level relays.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Addresses and permissions are typed, not bare integers.
//! - **Validation at the boundary**: Shape checks live next to the type they guard.
//!
//! ## Key Types
//!
//! - [`EnvId`]: Unique identifier for an execution context
//! - [`VirtAddr`]: A user virtual address
//! - [`PagePerm`]: Page-table permission bits accepted by system calls

pub mod ids;
pub mod memory;

pub use ids::EnvId;
pub use memory::{PagePerm, VirtAddr, PAGE_SIZE, UTOP};
