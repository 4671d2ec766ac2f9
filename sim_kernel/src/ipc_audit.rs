//! IPC Audit Trail
//!
//! Records every rendezvous event in order so tests can assert on what the
//! kernel actually delivered.
//!
//! ## Philosophy
//!
//! - Test-only: this is NOT production logging, it's for test verification
//! - Deterministic: events are recorded in the order the kernel saw them
//!
//! ## Example
//!
//! ```
//! use sim_kernel::ipc_audit::{IpcAuditLog, IpcEvent};
//! use core_types::EnvId;
//!
//! let mut audit = IpcAuditLog::new();
//! let env = EnvId::new();
//! audit.record(IpcEvent::Armed { env, dst: None });
//!
//! assert!(audit.has_event(|e| matches!(e, IpcEvent::Armed { .. })));
//! ```

use core_types::{EnvId, PagePerm, VirtAddr};
use kernel_api::KernelError;

/// One rendezvous event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpcEvent {
    /// `env` entered a receive
    Armed { env: EnvId, dst: Option<VirtAddr> },
    /// A send completed
    Delivered {
        from: EnvId,
        to: EnvId,
        value: u32,
        perm: Option<PagePerm>,
    },
    /// A send failed
    Rejected {
        from: EnvId,
        to: EnvId,
        error: KernelError,
    },
}

/// Chronological record of rendezvous events
#[derive(Debug, Default)]
pub struct IpcAuditLog {
    events: Vec<IpcEvent>,
}

impl IpcAuditLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn record(&mut self, event: IpcEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[IpcEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Checks if an event matching the predicate exists
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&IpcEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    /// Counts events matching the predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&IpcEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }

    /// Deliveries to `to`, in order
    pub fn deliveries_to(&self, to: EnvId) -> Vec<(EnvId, u32)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                IpcEvent::Delivered {
                    from, to: target, value, ..
                } if *target == to => Some((*from, *value)),
                _ => None,
            })
            .collect()
    }
}
