//! Simulation configuration

use serde::{Deserialize, Serialize};

/// Knobs for a [`crate::SimulatedKernel`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Physical frames available to all contexts together
    pub max_frames: usize,
    /// Consecutive yields a context may make without completing any other
    /// system call before it is declared stalled; `None` disables the guard
    pub max_idle_yields: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_frames: 256,
            max_idle_yields: Some(10_000),
        }
    }
}
