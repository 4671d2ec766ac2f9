//! The rendezvous primitive
//!
//! Each execution context owns one [`Endpoint`]. A receiver arms it with
//! [`Endpoint::begin_receive`]; a sender completes it with
//! [`Endpoint::try_send`]. Completion disarms the endpoint in the same step,
//! so a second sender always finds it idle.
//!
//! ## Send validation order
//!
//! 1. The receiver must be waiting, else [`IpcError::NotReceiving`].
//! 2. If a page below `UTOP` is offered: it must be page-aligned, its
//!    permission must have the syscall shape, it must be mapped in the
//!    sender, and it may only be granted writable if the sender's own
//!    mapping is writable. Any violation is [`IpcError::InvalidArgument`]
//!    and nothing is delivered.
//! 3. The page is aliased only if the receiver asked for one.

use crate::message::{IpcReceipt, IpcSend};
use core_types::{EnvId, PagePerm, VirtAddr};
use thiserror::Error;

/// Rendezvous failures
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// The target is not blocked in a receive
    #[error("Target is not receiving")]
    NotReceiving,

    /// Address or permission failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl IpcError {
    /// Checks whether the sender may try again later
    pub fn is_retryable(&self) -> bool {
        matches!(self, IpcError::NotReceiving)
    }
}

/// Page-table operations a send needs
///
/// Implemented by whatever owns the address spaces.
pub trait PageTransfer {
    /// Returns the permission of `env`'s mapping at `va`, if any
    fn lookup(&self, env: EnvId, va: VirtAddr) -> Option<PagePerm>;

    /// Maps the frame behind `src` at `dst` with `perm`
    ///
    /// Replaces whatever `dst` mapped before. Both writes through either
    /// mapping must be visible through the other afterwards.
    fn alias(
        &mut self,
        src: (EnvId, VirtAddr),
        dst: (EnvId, VirtAddr),
        perm: PagePerm,
    ) -> Result<(), IpcError>;
}

/// Receive state of one context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecvState {
    /// Not in a receive
    #[default]
    Idle,
    /// Blocked in a receive, optionally willing to take a page at `dst`
    Waiting { dst: Option<VirtAddr> },
}

/// One context's half of the rendezvous
#[derive(Debug, Clone, Default)]
pub struct Endpoint {
    state: RecvState,
    receipt: Option<IpcReceipt>,
}

impl Endpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecvState {
        self.state
    }

    /// Checks whether a sender could complete right now
    pub fn is_receiving(&self) -> bool {
        matches!(self.state, RecvState::Waiting { .. })
    }

    /// Declares intent to receive
    ///
    /// A destination at or above `UTOP` means "value only". A destination
    /// below `UTOP` must be page-aligned. Any earlier receipt is discarded.
    pub fn begin_receive(&mut self, dst: Option<VirtAddr>) -> Result<(), IpcError> {
        let dst = match dst {
            Some(va) if va.is_user() => {
                if !va.is_page_aligned() {
                    return Err(IpcError::InvalidArgument("receive address not page-aligned"));
                }
                Some(va)
            }
            _ => None,
        };
        self.receipt = None;
        self.state = RecvState::Waiting { dst };
        Ok(())
    }

    /// Abandons a pending receive
    pub fn cancel(&mut self) {
        self.state = RecvState::Idle;
    }

    /// The last delivery, if one has completed since `begin_receive`
    pub fn receipt(&self) -> Option<&IpcReceipt> {
        self.receipt.as_ref()
    }

    /// Takes the last delivery
    pub fn take_receipt(&mut self) -> Option<IpcReceipt> {
        self.receipt.take()
    }

    /// Attempts to complete a pending receive
    ///
    /// On success the endpoint is idle again and holds the returned receipt.
    /// On failure the endpoint is unchanged.
    pub fn try_send<P: PageTransfer>(
        &mut self,
        pages: &mut P,
        send: IpcSend,
    ) -> Result<IpcReceipt, IpcError> {
        let RecvState::Waiting { dst } = self.state else {
            return Err(IpcError::NotReceiving);
        };

        let grant = send.page.filter(|grant| grant.va.is_user());
        let mut perm = None;
        if let Some(grant) = grant {
            if !grant.va.is_page_aligned() {
                return Err(IpcError::InvalidArgument("source address not page-aligned"));
            }
            if !PagePerm::is_valid_for_syscall(grant.perm.bits()) {
                return Err(IpcError::InvalidArgument("invalid page permission"));
            }
            let mapped = pages
                .lookup(send.from, grant.va)
                .ok_or(IpcError::InvalidArgument("source page not mapped"))?;
            if grant.perm.is_writable() && !mapped.is_writable() {
                return Err(IpcError::InvalidArgument(
                    "writable grant of a read-only page",
                ));
            }

            if let Some(dst) = dst {
                pages.alias((send.from, grant.va), (send.to, dst), grant.perm)?;
                perm = Some(grant.perm);
            }
        }

        let receipt = IpcReceipt {
            from: send.from,
            value: send.value,
            perm,
        };
        self.state = RecvState::Idle;
        self.receipt = Some(receipt);
        log::trace!("ipc: delivered {} to {}", receipt, send.to);
        Ok(receipt)
    }
}
