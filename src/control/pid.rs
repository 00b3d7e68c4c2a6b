//! PID controller
//!
//! One control step per call, no internal timing: the caller supplies the
//! elapsed time since the previous step.  The integrator is bounded and
//! frozen while the output saturates.

use serde::{Deserialize, Serialize};

/// Controller gains.  Integral and derivative are optional (zero = off).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn proportional(kp: f32) -> Self {
        Self {
            kp,
            ki: 0.0,
            kd: 0.0,
        }
    }
}

/// Individual contributions of the last step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidTerms {
    pub p: f32,
    pub i: f32,
    pub d: f32,
}

/// PID controller
#[derive(Debug, Clone)]
pub struct PidController {
    gains: PidGains,
    integral: f32,
    /// Bound on the accumulated error·seconds.
    integral_limit: f32,
    prev_error: Option<f32>,
    output_limits: Option<(f32, f32)>,
    last: PidTerms,
}

impl PidController {
    pub const DEFAULT_INTEGRAL_LIMIT: f32 = 100.0;

    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            integral: 0.0,
            integral_limit: Self::DEFAULT_INTEGRAL_LIMIT,
            prev_error: None,
            output_limits: None,
            last: PidTerms::default(),
        }
    }

    /// Clamp the output to the actuator range.
    pub fn with_output_limits(mut self, min: f32, max: f32) -> Self {
        self.output_limits = Some((min, max));
        self
    }

    pub fn with_integral_limit(mut self, limit: f32) -> Self {
        self.integral_limit = limit.abs();
        self
    }

    /// Swap gains without losing integrator state.
    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// One control step.
    pub fn compute(&mut self, setpoint: f32, measurement: f32, dt_ms: f32) -> f32 {
        let error = setpoint - measurement;
        let dt = dt_ms / 1000.0;

        // Proportional
        let p = self.gains.kp * error;

        // Integral (bounded)
        let prev_integral = self.integral;
        if self.gains.ki != 0.0 && dt > 0.0 {
            self.integral =
                (self.integral + error * dt).clamp(-self.integral_limit, self.integral_limit);
        }
        let i = self.gains.ki * self.integral;

        // Derivative (skipped on the first step after reset)
        let d = match self.prev_error {
            Some(prev) if dt > 0.0 => self.gains.kd * (error - prev) / dt,
            _ => 0.0,
        };
        self.prev_error = Some(error);

        let raw = p + i + d;
        let output = match self.output_limits {
            Some((min, max)) => raw.clamp(min, max),
            None => raw,
        };

        // Anti-windup: if output is saturated, stop integrating
        if output != raw {
            self.integral = prev_integral;
        }

        self.last = PidTerms { p, i, d };
        output
    }

    /// Terms of the most recent [`compute`](Self::compute).
    pub fn terms(&self) -> PidTerms {
        self.last
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Reset controller state
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
        self.last = PidTerms::default();
    }
}
