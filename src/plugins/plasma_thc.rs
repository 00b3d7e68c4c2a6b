//! Plasma torch height control.
//!
//! While the torch is lit, a periodic-task listener samples the arc
//! voltage at `$354` Hz, runs one PID step against the `$350` setpoint and
//! thresholds the output into the up / down / arc-ok outputs the motion
//! controller follows:
//!
//! ```text
//!  Tick ──▶ Cadence ──▶ read_volts ──▶ PID(setpoint, volts, dt) ──▶ ThresholdPolicy
//!                                                                        │
//!                                                   up · down · arc-ok ◀─┘
//! ```
//!
//! TorchOn resets the controller; TorchOff (or a failed reading) drops
//! every output.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::drive;
use crate::app::ports::ArcVoltagePort;
use crate::app::service::Registrar;
use crate::control::pid::{PidController, PidGains};
use crate::control::threshold::{Actuation, ThresholdPolicy};
use crate::error::{ActuatorError, Error};
use crate::events::{Dispatch, Notification};
use crate::scheduler::Cadence;
use crate::settings::{PersistedSettings, SettingDescriptor, SettingFormat, SettingsHandle};
use crate::status::Status;

pub const SETPOINT_ID: u16 = 350;
pub const KP_ID: u16 = 351;
pub const KI_ID: u16 = 352;
pub const KD_ID: u16 = 353;
pub const RATE_ID: u16 = 354;
pub const DEADBAND_ID: u16 = 355;
pub const OK_BAND_ID: u16 = 356;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThcSettings {
    pub setpoint_v: f32,
    pub gains: PidGains,
    pub rate_hz: u16,
    pub policy: ThresholdPolicy,
}

impl Default for ThcSettings {
    fn default() -> Self {
        Self {
            setpoint_v: 120.0,
            gains: PidGains::proportional(1.0),
            rate_hz: 50,
            policy: ThresholdPolicy::default(),
        }
    }
}

const fn decimal(id: u16, name: &'static str) -> SettingDescriptor {
    SettingDescriptor {
        id,
        name,
        format: SettingFormat::Decimal,
    }
}

impl PersistedSettings for ThcSettings {
    const SIZE: u16 = 32;
    const DESCRIPTORS: &'static [SettingDescriptor] = &[
        decimal(SETPOINT_ID, "THC arc voltage setpoint, V"),
        decimal(KP_ID, "THC proportional gain"),
        decimal(KI_ID, "THC integral gain"),
        decimal(KD_ID, "THC derivative gain"),
        SettingDescriptor {
            id: RATE_ID,
            name: "THC sample rate, Hz",
            format: SettingFormat::Integer,
        },
        decimal(DEADBAND_ID, "THC up/down deadband"),
        decimal(OK_BAND_ID, "THC arc-ok band"),
    ];

    fn value(&self, id: u16) -> Option<f32> {
        Some(match id {
            SETPOINT_ID => self.setpoint_v,
            KP_ID => self.gains.kp,
            KI_ID => self.gains.ki,
            KD_ID => self.gains.kd,
            RATE_ID => f32::from(self.rate_hz),
            DEADBAND_ID => self.policy.deadband,
            OK_BAND_ID => self.policy.ok_band,
            _ => return None,
        })
    }

    fn apply(&mut self, id: u16, value: f32) -> Status {
        if !value.is_finite() {
            return Status::InvalidStatement;
        }
        if value < 0.0 {
            return Status::NegativeValue;
        }
        match id {
            SETPOINT_ID => self.setpoint_v = value,
            KP_ID => self.gains.kp = value,
            KI_ID => self.gains.ki = value,
            KD_ID => self.gains.kd = value,
            RATE_ID => {
                if !(1.0..=1000.0).contains(&value) {
                    return Status::InvalidStatement;
                }
                self.rate_hz = value.round() as u16;
            }
            DEADBAND_ID => self.policy.deadband = value,
            OK_BAND_ID => self.policy.ok_band = value,
            _ => return Status::InvalidStatement,
        }
        Status::Ok
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Outputs read by the motion controller.
pub struct ThcOutputs<P> {
    pub up: P,
    pub down: P,
    pub arc_ok: P,
}

pub struct PlasmaThc<A, P> {
    sensor: A,
    outputs: ThcOutputs<P>,
    settings: SettingsHandle<ThcSettings>,
    pid: PidController,
    cadence: Cadence,
    torch_on: bool,
    last: Actuation,
}

impl<A: ArcVoltagePort, P: OutputPin> PlasmaThc<A, P> {
    fn torch_on(&mut self) {
        let s = *self.settings.borrow();
        self.pid.set_gains(s.gains);
        self.pid.reset();
        self.cadence.set_rate(s.rate_hz);
        self.torch_on = true;
        info!("THC: torch on, setpoint {:.1} V at {} Hz", s.setpoint_v, s.rate_hz);
    }

    fn torch_off(&mut self) -> Result<(), ActuatorError> {
        self.torch_on = false;
        info!("THC: torch off");
        self.actuate(Actuation::IDLE)
    }

    /// One periodic pass.  Returns the decision when a sample was taken.
    fn poll(&mut self, now_ms: u32) -> Result<Option<Actuation>, Error> {
        if !self.torch_on {
            return Ok(None);
        }
        let Some(dt_ms) = self.cadence.poll(now_ms) else {
            return Ok(None);
        };

        let volts = match self.sensor.read_volts() {
            Ok(v) => v,
            Err(e) => {
                self.actuate(Actuation::IDLE)?;
                return Err(e.into());
            }
        };

        let s = *self.settings.borrow();
        self.pid.set_gains(s.gains);
        let output = self.pid.compute(s.setpoint_v, volts, dt_ms as f32);
        let decision = s.policy.decide(output);
        debug!(
            "THC: {:.2} V -> {:+.3} (up={} down={} ok={})",
            volts, output, decision.up, decision.down, decision.ok
        );
        self.actuate(decision)?;
        Ok(Some(decision))
    }

    fn actuate(&mut self, decision: Actuation) -> Result<(), ActuatorError> {
        drive(&mut self.outputs.up, decision.up)?;
        drive(&mut self.outputs.down, decision.down)?;
        drive(&mut self.outputs.arc_ok, decision.ok)?;
        self.last = decision;
        Ok(())
    }

    pub fn is_torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn last_decision(&self) -> Actuation {
        self.last
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    pub fn settings(&self) -> &SettingsHandle<ThcSettings> {
        &self.settings
    }
}

pub fn install<A, P>(
    reg: &mut Registrar,
    sensor: A,
    outputs: ThcOutputs<P>,
) -> Result<Rc<RefCell<PlasmaThc<A, P>>>, Error>
where
    A: ArcVoltagePort + 'static,
    P: OutputPin + 'static,
{
    let settings = reg.register_settings::<ThcSettings>("plasma_thc")?;
    let defaults = ThcSettings::default();
    let thc = Rc::new(RefCell::new(PlasmaThc {
        sensor,
        outputs,
        settings,
        pid: PidController::new(defaults.gains),
        cadence: Cadence::from_rate(defaults.rate_hz),
        torch_on: false,
        last: Actuation::IDLE,
    }));

    let t = Rc::clone(&thc);
    reg.bus().on_notify(move |notification, _host| {
        let mut thc = t.borrow_mut();
        match notification {
            Notification::TorchOn => thc.torch_on(),
            Notification::TorchOff => {
                if let Err(e) = thc.torch_off() {
                    warn!("THC: outputs not released: {}", e);
                }
            }
            _ => {}
        }
        Dispatch::Continue
    });

    let t = Rc::clone(&thc);
    reg.bus().on_periodic(move |tick, _host| {
        if let Err(e) = t.borrow_mut().poll(tick.now_ms) {
            warn!("THC: sample skipped: {}", e);
        }
        Dispatch::Continue
    });

    Ok(thc)
}
