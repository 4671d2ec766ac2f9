//! Retry-with-yield

use kernel_api::{KernelError, Syscalls};

/// Runs `op` until it stops failing with a transient error
///
/// `transient` decides which errors are retried; the caller yields between
/// attempts. On real hardware this never gives up. In simulation the yield
/// itself fails once the stall guard trips.
pub fn retry_with_yield<S, T, F, P>(sys: &mut S, mut op: F, transient: P) -> Result<T, KernelError>
where
    S: Syscalls + ?Sized,
    F: FnMut(&mut S) -> Result<T, KernelError>,
    P: Fn(&KernelError) -> bool,
{
    loop {
        match op(sys) {
            Err(err) if transient(&err) => sys.yield_now()?,
            other => return other,
        }
    }
}
