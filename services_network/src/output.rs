//! Output relay: stack → device
//!
//! The stack sends [`NetRequest::Output`] with a packet page; the relay
//! queues the frame on the transmit ring, yielding while the ring is full.
//! Messages from anyone else, with another tag or without a page are
//! dropped and the relay keeps serving.

use crate::{retry_with_yield, RelayError, REQUEST_PAGE};
use core_types::{EnvId, VirtAddr, PAGE_SIZE};
use ipc::{NetRequest, PacketPage};
use kernel_api::{KernelError, Syscalls};
use std::convert::Infallible;
use std::fmt;

/// Why a message was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discarded {
    /// Sent by someone other than the stack
    ForeignSender(EnvId),
    /// Carried a tag other than `Output`
    UnexpectedRequest(u32),
    /// Did not carry a page
    MissingPage,
}

impl fmt::Display for Discarded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discarded::ForeignSender(env) => write!(f, "message from foreign sender {}", env),
            Discarded::UnexpectedRequest(value) => match NetRequest::from_value(*value) {
                Some(req) => write!(f, "unexpected request {}", req),
                None => write!(f, "unknown request {}", value),
            },
            Discarded::MissingPage => write!(f, "output request without a page"),
        }
    }
}

/// Outcome of one served message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// A frame of this length was queued
    Transmitted(usize),
    Discarded(Discarded),
}

/// Transmits frames handed over by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputRelay {
    stack: EnvId,
    page: VirtAddr,
}

impl OutputRelay {
    /// A relay serving `stack`, receiving pages at [`REQUEST_PAGE`]
    pub fn new(stack: EnvId) -> Self {
        Self::with_page(stack, REQUEST_PAGE)
    }

    pub fn with_page(stack: EnvId, page: VirtAddr) -> Self {
        Self { stack, page }
    }

    pub fn stack(&self) -> EnvId {
        self.stack
    }

    pub fn page(&self) -> VirtAddr {
        self.page
    }

    /// Receives one message and transmits its frame
    ///
    /// A frame longer than the device accepts, or a page whose length
    /// field is out of range, ends the relay.
    pub fn serve_one<S: Syscalls + ?Sized>(&self, sys: &mut S) -> Result<Served, RelayError> {
        let receipt = sys.ipc_recv(Some(self.page))?;

        let discarded = if receipt.from != self.stack {
            Some(Discarded::ForeignSender(receipt.from))
        } else if NetRequest::from_value(receipt.value) != Some(NetRequest::Output) {
            Some(Discarded::UnexpectedRequest(receipt.value))
        } else if !receipt.carries_page() {
            Some(Discarded::MissingPage)
        } else {
            None
        };
        if let Some(reason) = discarded {
            log::warn!("output: dropped {}", reason);
            return Ok(Served::Discarded(reason));
        }

        let mut page = vec![0u8; PAGE_SIZE];
        sys.copy_from_page(self.page, 0, &mut page)?;
        let frame = PacketPage::decode(&page)?;

        retry_with_yield(
            sys,
            |s| s.net_try_transmit(frame),
            |e| *e == KernelError::RingFull,
        )?;

        log::debug!("output: queued {} bytes", frame.len());
        Ok(Served::Transmitted(frame.len()))
    }

    /// Serves messages until something fails for good
    pub fn run<S: Syscalls + ?Sized>(&self, sys: &mut S) -> Result<Infallible, RelayError> {
        log::info!("output relay started for stack {}", self.stack);
        loop {
            if let Err(err) = self.serve_one(sys) {
                log::error!("output relay stopped: {}", err);
                return Err(err);
            }
        }
    }
}
