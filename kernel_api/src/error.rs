//! Kernel error types

use core_types::EnvId;
use ipc::IpcError;
use thiserror::Error;

/// Errors returned across the system-call boundary
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// No such execution context
    #[error("Bad environment: {0}")]
    BadEnv(EnvId),

    /// The IPC target is not blocked in a receive
    #[error("Target is not receiving")]
    NotReceiving,

    /// Address, permission or length failed validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No free page frame
    #[error("Out of memory")]
    NoMemory,

    /// Frame exceeds the transmit ceiling
    #[error("Packet too long: {len} bytes exceeds the {max}-byte limit")]
    PacketTooLong { len: usize, max: usize },

    /// Transmit ring has no free slot
    #[error("Transmit ring full")]
    RingFull,

    /// Receive ring has no frame
    #[error("Receive ring empty")]
    RingEmpty,

    /// The device delivered part of a multi-descriptor frame
    #[error("Unsupported framing at receive descriptor {index}")]
    UnsupportedFraming { index: usize },

    /// The device failed its identity check
    #[error("Device identity mismatch: status {found:#010x}, expected {expected:#010x}")]
    DeviceIdentity { expected: u32, found: u32 },

    /// No network device is attached
    #[error("No network device")]
    NoDevice,

    /// The simulation's per-context yield guard ran out
    #[error("{env} stalled after {yields} yields")]
    Stalled { env: EnvId, yields: u64 },
}

impl KernelError {
    /// Checks whether the operation may succeed if retried after a yield
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KernelError::NotReceiving
                | KernelError::NoMemory
                | KernelError::RingFull
                | KernelError::RingEmpty
        )
    }
}

impl From<IpcError> for KernelError {
    fn from(err: IpcError) -> Self {
        match err {
            IpcError::NotReceiving => KernelError::NotReceiving,
            IpcError::InvalidArgument(reason) => KernelError::InvalidArgument(reason.to_string()),
        }
    }
}
