//! Driver error types

use hal::{DmaError, MmioError};
use thiserror::Error;

/// Errors reported by the e1000 driver
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum NicError {
    /// Frame exceeds the single-descriptor transmit ceiling
    #[error("Packet too long: {len} bytes exceeds the {max}-byte limit")]
    PacketTooLong { len: usize, max: usize },

    /// The transmit slot at the tail is still owned by hardware
    #[error("Transmit ring full")]
    RingFull,

    /// The next receive slot has not been filled by hardware
    #[error("Receive ring empty")]
    RingEmpty,

    /// Hardware completed a descriptor without end-of-packet
    #[error("Descriptor {index} completed without end-of-packet; multi-descriptor frames are unsupported")]
    UnsupportedFraming { index: usize },

    /// The status register did not identify the expected device
    #[error("Device identity mismatch: status {found:#010x}, expected {expected:#010x}")]
    DeviceIdentity { expected: u32, found: u32 },

    /// Ring capacity is zero or its byte length is not 128-byte aligned
    #[error("Invalid ring size: {0} descriptors")]
    InvalidRingSize(usize),

    /// A configuration field does not fit its register
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// DMA memory could not be allocated
    #[error(transparent)]
    Dma(#[from] DmaError),

    /// The register window could not be built
    #[error(transparent)]
    Mmio(#[from] MmioError),
}

impl NicError {
    /// Checks whether the caller may retry the same operation later
    ///
    /// Only ring backpressure is transient. Everything else either comes from
    /// the caller's input or means the ring can no longer be trusted.
    pub fn is_retryable(&self) -> bool {
        matches!(self, NicError::RingFull | NicError::RingEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_is_retryable() {
        assert!(NicError::RingFull.is_retryable());
        assert!(NicError::RingEmpty.is_retryable());
    }

    #[test]
    fn test_input_and_fatal_errors_are_not_retryable() {
        assert!(!NicError::PacketTooLong { len: 1519, max: 1518 }.is_retryable());
        assert!(!NicError::UnsupportedFraming { index: 3 }.is_retryable());
        assert!(!NicError::DeviceIdentity {
            expected: 1,
            found: 2
        }
        .is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = NicError::PacketTooLong { len: 1519, max: 1518 };
        assert_eq!(
            err.to_string(),
            "Packet too long: 1519 bytes exceeds the 1518-byte limit"
        );

        let err = NicError::DeviceIdentity {
            expected: 0x8008_0783,
            found: 0,
        };
        assert!(err.to_string().contains("0x80080783"));
    }
}
