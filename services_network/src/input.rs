//! Input relay: device → stack
//!
//! Each received frame goes to the stack in a page of its own. The relay
//! allocates a fresh page per frame because the stack keeps the previous one
//! mapped until it has finished with it.

use crate::{retry_with_yield, RelayError, MAX_RX_FRAME, REQUEST_PAGE};
use core_types::{EnvId, PagePerm, VirtAddr};
use ipc::{NetRequest, PacketPage, PACKET_HEADER_SIZE};
use kernel_api::{KernelError, Syscalls};
use std::convert::Infallible;

/// Forwards received frames to the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRelay {
    stack: EnvId,
    page: VirtAddr,
}

impl InputRelay {
    /// A relay feeding `stack` through [`REQUEST_PAGE`]
    pub fn new(stack: EnvId) -> Self {
        Self::with_page(stack, REQUEST_PAGE)
    }

    /// A relay that stages frames at `page`
    pub fn with_page(stack: EnvId, page: VirtAddr) -> Self {
        Self { stack, page }
    }

    pub fn stack(&self) -> EnvId {
        self.stack
    }

    pub fn page(&self) -> VirtAddr {
        self.page
    }

    /// Moves one frame from the receive ring to the stack
    ///
    /// Waits (by yielding) for a frame, for a free page and for the stack
    /// to be receiving. Returns the frame length.
    pub fn forward_one<S: Syscalls + ?Sized>(&self, sys: &mut S) -> Result<usize, RelayError> {
        let mut frame = [0u8; MAX_RX_FRAME];
        let len = retry_with_yield(
            sys,
            |s| s.net_try_receive(&mut frame),
            |e| *e == KernelError::RingEmpty,
        )?;

        retry_with_yield(
            sys,
            |s| s.page_alloc(self.page, PagePerm::USER_WRITE),
            |e| *e == KernelError::NoMemory,
        )?;

        let mut staged = vec![0u8; PACKET_HEADER_SIZE + len];
        PacketPage::encode(&mut staged, &frame[..len])?;
        sys.copy_to_page(self.page, 0, &staged)?;

        retry_with_yield(
            sys,
            |s| {
                s.ipc_try_send(
                    self.stack,
                    NetRequest::Input.value(),
                    Some(self.page),
                    PagePerm::USER_WRITE,
                )
            },
            |e| *e == KernelError::NotReceiving,
        )?;

        log::debug!("input: forwarded {} bytes to {}", len, self.stack);
        Ok(len)
    }

    /// Forwards frames until something fails for good
    pub fn run<S: Syscalls + ?Sized>(&self, sys: &mut S) -> Result<Infallible, RelayError> {
        log::info!("input relay started for stack {}", self.stack);
        loop {
            if let Err(err) = self.forward_one(sys) {
                log::error!("input relay stopped: {}", err);
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSyscalls;

    #[test]
    fn test_forwards_frame_in_packet_page() {
        let mut sys = MockSyscalls::new();
        let stack = EnvId::new();
        sys.rx.push_back(Ok(b"HELLO".to_vec()));

        let relay = InputRelay::new(stack);
        assert_eq!(relay.forward_one(&mut sys).unwrap(), 5);

        assert_eq!(
            sys.sent,
            vec![(stack, 10, Some(REQUEST_PAGE), PagePerm::USER_WRITE)]
        );
        let page = &sys.pages[&REQUEST_PAGE];
        assert_eq!(&page[..4], &[5, 0, 0, 0]);
        assert_eq!(&page[4..9], b"HELLO");
        assert_eq!(PacketPage::decode(page), Ok(&b"HELLO"[..]));
    }

    #[test]
    fn test_fresh_page_per_frame() {
        let mut sys = MockSyscalls::new();
        sys.rx.push_back(Ok(b"first frame".to_vec()));
        sys.rx.push_back(Ok(b"2nd".to_vec()));

        let relay = InputRelay::new(EnvId::new());
        relay.forward_one(&mut sys).unwrap();
        relay.forward_one(&mut sys).unwrap();

        assert_eq!(sys.allocs, 2);
        // A zeroed page: nothing of the longer first frame survives.
        let page = &sys.pages[&REQUEST_PAGE];
        assert_eq!(PacketPage::decode(page), Ok(&b"2nd"[..]));
        assert!(page[7..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_waits_out_transient_errors() {
        let mut sys = MockSyscalls::new();
        sys.rx.push_back(Err(KernelError::RingEmpty));
        sys.rx.push_back(Err(KernelError::RingEmpty));
        sys.rx.push_back(Ok(vec![0xAB; 60]));
        sys.alloc_failures.push_back(KernelError::NoMemory);
        sys.send_failures.push_back(KernelError::NotReceiving);
        sys.send_failures.push_back(KernelError::NotReceiving);

        let relay = InputRelay::new(EnvId::new());
        assert_eq!(relay.forward_one(&mut sys).unwrap(), 60);
        assert_eq!(sys.yields, 5);
        assert_eq!(sys.sent.len(), 1);
    }

    #[test]
    fn test_fatal_errors_stop_the_relay() {
        let mut sys = MockSyscalls::new();
        sys.rx.push_back(Err(KernelError::UnsupportedFraming { index: 3 }));

        let relay = InputRelay::new(EnvId::new());
        assert_eq!(
            relay.run(&mut sys).unwrap_err(),
            RelayError::Kernel(KernelError::UnsupportedFraming { index: 3 })
        );
        assert!(sys.sent.is_empty());
    }

    #[test]
    fn test_bad_target_is_fatal() {
        let mut sys = MockSyscalls::new();
        let stack = EnvId::new();
        sys.rx.push_back(Ok(b"x".to_vec()));
        sys.send_failures.push_back(KernelError::BadEnv(stack));

        let relay = InputRelay::new(stack);
        assert_eq!(
            relay.forward_one(&mut sys),
            Err(RelayError::Kernel(KernelError::BadEnv(stack)))
        );
        assert_eq!(sys.yields, 0);
    }

    #[test]
    fn test_run_ends_on_stall() {
        let mut sys = MockSyscalls::new();
        sys.rx.push_back(Ok(b"one".to_vec()));

        let relay = InputRelay::new(EnvId::new());
        let err = relay.run(&mut sys).unwrap_err();
        assert!(matches!(err, RelayError::Kernel(KernelError::Stalled { .. })));
        assert_eq!(sys.sent.len(), 1);
    }
}
