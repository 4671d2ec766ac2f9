//! Relay error types

use ipc::PacketPageError;
use kernel_api::KernelError;
use thiserror::Error;

/// Why a relay stopped
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A system call failed with a non-transient error
    #[error(transparent)]
    Kernel(#[from] KernelError),

    /// The stack handed over a malformed packet page
    #[error(transparent)]
    PacketPage(#[from] PacketPageError),
}
