//! Service Status
//!
//! Liveness and readiness flags for orchestrator probes.

use std::sync::atomic::{AtomicBool, Ordering};

/// Probe outcome derived from a status flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Flag is set
    Up,
    /// Flag is cleared
    Down,
}

impl ProbeStatus {
    fn from_flag(flag: bool) -> Self {
        if flag {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        }
    }

    /// Check if the probe passes
    pub fn is_up(&self) -> bool {
        *self == ProbeStatus::Up
    }

    /// Lower-case name, used as the probe response body
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Up => "up",
            ProbeStatus::Down => "down",
        }
    }
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe liveness/readiness holder.
///
/// Starts alive but not ready: the process is running and has not finished
/// initialising its dependencies. The two flags are independent; each is
/// atomic on its own but there is no ordering between them.
#[derive(Debug)]
pub struct Status {
    alive: AtomicBool,
    ready: AtomicBool,
}

impl Status {
    /// Create a new status (alive, not ready)
    pub fn new() -> Self {
        Self {
            alive: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the service is alive (for health checks)
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Whether the service is ready to accept requests
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Set liveness
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Set readiness
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Liveness as a probe outcome
    pub fn liveness(&self) -> ProbeStatus {
        ProbeStatus::from_flag(self.is_alive())
    }

    /// Readiness as a probe outcome
    pub fn readiness(&self) -> ProbeStatus {
        ProbeStatus::from_flag(self.is_ready())
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
