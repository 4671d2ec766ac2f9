//! Message types

use core_types::{EnvId, PagePerm, VirtAddr};
use std::fmt;

/// A page offered alongside a send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGrant {
    /// Sender-side address; at or above `UTOP` means "no page"
    pub va: VirtAddr,
    /// Permission for the receiver's mapping
    pub perm: PagePerm,
}

impl PageGrant {
    pub fn new(va: VirtAddr, perm: PagePerm) -> Self {
        Self { va, perm }
    }
}

/// One send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcSend {
    pub from: EnvId,
    pub to: EnvId,
    pub value: u32,
    pub page: Option<PageGrant>,
}

impl IpcSend {
    /// A value-only send
    pub fn value(from: EnvId, to: EnvId, value: u32) -> Self {
        Self {
            from,
            to,
            value,
            page: None,
        }
    }

    /// Attaches a page
    pub fn with_page(mut self, va: VirtAddr, perm: PagePerm) -> Self {
        self.page = Some(PageGrant::new(va, perm));
        self
    }
}

/// What a receiver observes after a delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcReceipt {
    /// The sender
    pub from: EnvId,
    /// The 32-bit payload
    pub value: u32,
    /// Permission of the page mapped at the receiver's destination, or
    /// `None` if no page moved
    pub perm: Option<PagePerm>,
}

impl IpcReceipt {
    /// Checks whether a page was mapped at the receiver's destination
    pub fn carries_page(&self) -> bool {
        self.perm.is_some()
    }
}

impl fmt::Display for IpcReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.perm {
            Some(perm) => write!(f, "{} from {} with page [{}]", self.value, self.from, perm),
            None => write!(f, "{} from {}", self.value, self.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_builder() {
        let from = EnvId::new();
        let to = EnvId::new();
        let send = IpcSend::value(from, to, 11).with_page(VirtAddr::new(0x1000), PagePerm::USER_READ);

        assert_eq!(send.value, 11);
        assert_eq!(
            send.page,
            Some(PageGrant::new(VirtAddr::new(0x1000), PagePerm::USER_READ))
        );
    }

    #[test]
    fn test_receipt_display() {
        let from = EnvId::new();
        let plain = IpcReceipt {
            from,
            value: 7,
            perm: None,
        };
        assert!(!plain.carries_page());
        assert!(plain.to_string().starts_with("7 from Env("));

        let paged = IpcReceipt {
            perm: Some(PagePerm::USER_WRITE),
            ..plain
        };
        assert!(paged.carries_page());
        assert!(paged.to_string().ends_with("with page [PWU]"));
    }
}
