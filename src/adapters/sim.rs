//! Simulated host peripherals.
//!
//! Backs the `cncext-sim` binary and the unit tests: a machine that
//! records synchronisation barriers, stepper enables and delays, plus
//! output pins, a servo and an arc-voltage source whose state is shared
//! through `Rc<Cell<_>>` so the caller can observe or drive it.

use core::convert::Infallible;
use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};
use log::debug;

use super::nvs::NvsAdapter;
use crate::app::ports::{ArcVoltagePort, AxisMask, Host, MotionPort, N_AXIS, NvsPort};
use crate::error::SensorError;

// ── Machine ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SimMachine {
    pub position: [f32; N_AXIS],
    pub steppers_enabled: AxisMask,
    /// Number of `buffer_synchronize` barriers hit.
    pub syncs: u32,
    /// Total requested delay in nanoseconds.
    pub delayed_ns: u64,
}

impl MotionPort for SimMachine {
    fn buffer_synchronize(&mut self) {
        self.syncs += 1;
    }

    fn machine_position(&self) -> [f32; N_AXIS] {
        self.position
    }

    fn set_steppers_enabled(&mut self, axes: AxisMask, enabled: bool) {
        if enabled {
            self.steppers_enabled = AxisMask(self.steppers_enabled.0 | axes.0);
        } else {
            self.steppers_enabled = AxisMask(self.steppers_enabled.0 & !axes.0);
        }
        debug!("SimMachine: steppers now 0b{:03b}", self.steppers_enabled.0);
    }
}

impl DelayNs for SimMachine {
    fn delay_ns(&mut self, ns: u32) {
        self.delayed_ns += u64::from(ns);
    }
}

impl SimMachine {
    pub fn delayed_ms(&self) -> u64 {
        self.delayed_ns / 1_000_000
    }
}

// ── Host bundle ───────────────────────────────────────────────

pub struct SimHost {
    pub nvs: NvsAdapter,
    pub machine: SimMachine,
}

impl SimHost {
    pub fn new(nvs_size: u16) -> Self {
        Self::with_nvs(NvsAdapter::new(nvs_size))
    }

    pub fn with_nvs(nvs: NvsAdapter) -> Self {
        Self {
            nvs,
            machine: SimMachine::default(),
        }
    }
}

impl Host for SimHost {
    fn nvs(&mut self) -> &mut dyn NvsPort {
        &mut self.nvs
    }

    fn motion(&mut self) -> &mut dyn MotionPort {
        &mut self.machine
    }

    fn delay(&mut self) -> &mut dyn DelayNs {
        &mut self.machine
    }
}

// ── Output pin ────────────────────────────────────────────────

/// Output pin whose level is observable through [`SimPin::level`].
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Rc<Cell<bool>>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second view of the same level.
    pub fn probe(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.level)
    }

    pub fn level(&self) -> bool {
        self.level.get()
    }
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level.set(true);
        Ok(())
    }
}

// ── Servo PWM ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SimServo {
    duty: Rc<Cell<u16>>,
}

impl SimServo {
    pub const MAX_DUTY: u16 = 1000;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> Rc<Cell<u16>> {
        Rc::clone(&self.duty)
    }
}

impl pwm::ErrorType for SimServo {
    type Error = Infallible;
}

impl SetDutyCycle for SimServo {
    fn max_duty_cycle(&self) -> u16 {
        Self::MAX_DUTY
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.duty.set(duty);
        Ok(())
    }
}

// ── Arc voltage ───────────────────────────────────────────────

/// Arc-voltage source; `NaN` simulates a failed conversion and a
/// negative value an implausible one.
#[derive(Debug, Clone, Default)]
pub struct SimArcSensor {
    volts: Rc<Cell<f32>>,
}

impl SimArcSensor {
    pub fn new(volts: f32) -> Self {
        Self {
            volts: Rc::new(Cell::new(volts)),
        }
    }

    pub fn probe(&self) -> Rc<Cell<f32>> {
        Rc::clone(&self.volts)
    }
}

impl ArcVoltagePort for SimArcSensor {
    fn read_volts(&mut self) -> Result<f32, SensorError> {
        let v = self.volts.get();
        if v.is_nan() {
            Err(SensorError::AdcReadFailed)
        } else if v < 0.0 {
            Err(SensorError::OutOfRange)
        } else {
            Ok(v)
        }
    }
}
