//! # Inter-Process Communication (IPC)
//!
//! This crate defines the synchronous rendezvous primitive that moves a
//! 32-bit value, and optionally one page, between execution contexts.
//!
//! ## Philosophy
//!
//! - **Rendezvous, not queues**: a send succeeds only against a receiver that
//!   is already waiting. Nothing is buffered.
//! - **At most one delivery**: a pending receive is consumed by exactly one
//!   sender. Every other sender sees [`IpcError::NotReceiving`].
//! - **Pages move by aliasing**: a transferred page is the same physical
//!   frame mapped twice, never a copy.
//!
//! ## Architecture
//!
//! - [`rendezvous`]: per-context receive state and the send validation rules
//! - [`message`]: the values a send carries and a receiver observes
//! - [`netreq`]: request tags and the packet page shared with the network stack
//!
//! Page-table work is delegated to a [`PageTransfer`] implementation owned by
//! the kernel.

pub mod message;
pub mod netreq;
pub mod rendezvous;

pub use message::{IpcReceipt, IpcSend, PageGrant};
pub use netreq::{NetRequest, PacketPage, PacketPageError, PACKET_HEADER_SIZE, PACKET_MAX_LEN};
pub use rendezvous::{Endpoint, IpcError, PageTransfer, RecvState};
