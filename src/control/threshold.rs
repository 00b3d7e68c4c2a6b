//! Thresholding of a continuous control output into discrete actuation.
//!
//! Kept apart from the PID law so policy can change without touching the
//! numeric controller.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPolicy {
    /// Output below `-deadband` commands "up".
    pub deadband: f32,
    /// `|output|` below this reports the process as in band ("ok").
    pub ok_band: f32,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            deadband: 0.5,
            ok_band: 2.0,
        }
    }
}

/// Discrete decision for one control step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Actuation {
    pub up: bool,
    pub down: bool,
    pub ok: bool,
}

impl Actuation {
    pub const IDLE: Self = Self {
        up: false,
        down: false,
        ok: false,
    };
}

impl ThresholdPolicy {
    pub fn decide(&self, output: f32) -> Actuation {
        Actuation {
            up: output < -self.deadband,
            down: output > self.deadband,
            ok: output.abs() < self.ok_band,
        }
    }
}
