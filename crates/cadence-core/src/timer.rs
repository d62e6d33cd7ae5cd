//! Simulated clock
//!
//! Time is continuous and purely logical: operations advance it by their
//! effective duration, nothing else moves it. The unit is up to the caller
//! (seconds, frames, turns).

use serde::{Deserialize, Serialize};

/// Monotonic simulated clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    /// Current simulated time
    pub current_time: f64,
    /// Optional advisory cap on total simulated time. The kernel never
    /// enforces termination by it; drivers and callers may consult it.
    pub total_time: Option<f64>,
}

impl Timer {
    /// Create a new timer starting at zero
    pub fn new() -> Self {
        Self {
            current_time: 0.0,
            total_time: None,
        }
    }

    /// Create a timer with an advisory total-time cap
    pub fn with_total_time(total_time: f64) -> Self {
        Self {
            current_time: 0.0,
            total_time: Some(total_time),
        }
    }

    /// Advance time by `dt` and return the new time.
    ///
    /// Non-positive `dt` is a no-op, so the clock never moves backwards.
    pub fn update(&mut self, dt: f64) -> f64 {
        if dt > 0.0 {
            self.current_time += dt;
        }
        self.current_time
    }

    /// Current simulated time
    pub fn now(&self) -> f64 {
        self.current_time
    }

    /// Whether the advisory cap has been reached
    pub fn time_up(&self) -> bool {
        self.total_time
            .map(|total| self.current_time >= total)
            .unwrap_or(false)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
