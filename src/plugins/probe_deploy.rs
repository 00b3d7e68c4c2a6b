//! Servo-actuated probe: deploy/stow.
//!
//! Driven by the host's probe notifications and by M401 (deploy) /
//! M402 (stow).  Each move sets the servo duty then waits a bounded
//! settle time so the probe is in place before motion resumes.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::pwm::SetDutyCycle;
use log::{error, info};
use serde::{Deserialize, Serialize};

use super::{actuator_status, millis, percent};
use crate::app::ports::Host;
use crate::app::service::Registrar;
use crate::command::Claim;
use crate::error::{ActuatorError, Error};
use crate::events::{Dispatch, Notification};
use crate::settings::{PersistedSettings, SettingDescriptor, SettingFormat, SettingsHandle};
use crate::status::Status;

pub const DEPLOY_DUTY_ID: u16 = 400;
pub const STOW_DUTY_ID: u16 = 401;
pub const SETTLE_MS_ID: u16 = 402;

const DEPLOY: Claim = Claim::mcode(401);
const STOW: Claim = Claim::mcode(402);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSettings {
    /// Servo duty (percent) with the probe lowered.
    pub deploy_percent: u8,
    /// Servo duty (percent) with the probe raised.
    pub stow_percent: u8,
    pub settle_ms: u16,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            deploy_percent: 5,
            stow_percent: 10,
            settle_ms: 500,
        }
    }
}

impl PersistedSettings for ProbeSettings {
    const SIZE: u16 = 8;
    const DESCRIPTORS: &'static [SettingDescriptor] = &[
        SettingDescriptor {
            id: DEPLOY_DUTY_ID,
            name: "probe deploy duty, %",
            format: SettingFormat::Integer,
        },
        SettingDescriptor {
            id: STOW_DUTY_ID,
            name: "probe stow duty, %",
            format: SettingFormat::Integer,
        },
        SettingDescriptor {
            id: SETTLE_MS_ID,
            name: "probe settle time, ms",
            format: SettingFormat::Integer,
        },
    ];

    fn value(&self, id: u16) -> Option<f32> {
        match id {
            DEPLOY_DUTY_ID => Some(f32::from(self.deploy_percent)),
            STOW_DUTY_ID => Some(f32::from(self.stow_percent)),
            SETTLE_MS_ID => Some(f32::from(self.settle_ms)),
            _ => None,
        }
    }

    fn apply(&mut self, id: u16, value: f32) -> Status {
        let result = match id {
            DEPLOY_DUTY_ID => percent(value).map(|v| self.deploy_percent = v),
            STOW_DUTY_ID => percent(value).map(|v| self.stow_percent = v),
            SETTLE_MS_ID => millis(value).map(|v| self.settle_ms = v),
            _ => Err(Status::InvalidStatement),
        };
        result.err().unwrap_or(Status::Ok)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePosition {
    Unknown,
    Deployed,
    Stowed,
}

/// Servo plus its settings.
pub struct ProbeServo<S> {
    servo: S,
    settings: SettingsHandle<ProbeSettings>,
    max_delay_ms: u32,
    position: ProbePosition,
}

impl<S: SetDutyCycle> ProbeServo<S> {
    fn move_to(&mut self, target: ProbePosition, host: &mut dyn Host) -> Result<(), ActuatorError> {
        let (duty, settle) = {
            let s = self.settings.borrow();
            let duty = match target {
                ProbePosition::Stowed => s.stow_percent,
                _ => s.deploy_percent,
            };
            (duty, u32::from(s.settle_ms))
        };
        self.servo
            .set_duty_cycle_percent(duty)
            .map_err(|_| ActuatorError::PwmWriteFailed)?;
        host.delay().delay_ms(settle.min(self.max_delay_ms));
        self.position = target;
        info!("Probe: {:?} (duty {}%)", target, duty);
        Ok(())
    }

    pub fn position(&self) -> ProbePosition {
        self.position
    }

    pub fn settings(&self) -> &SettingsHandle<ProbeSettings> {
        &self.settings
    }
}

pub fn install<S: SetDutyCycle + 'static>(
    reg: &mut Registrar,
    servo: S,
) -> Result<Rc<RefCell<ProbeServo<S>>>, Error> {
    let settings = reg.register_settings::<ProbeSettings>("probe_deploy")?;
    let max_delay_ms = reg.config().max_blocking_delay_ms;
    let probe = Rc::new(RefCell::new(ProbeServo {
        servo,
        settings,
        max_delay_ms,
        position: ProbePosition::Unknown,
    }));

    let p = Rc::clone(&probe);
    reg.bus().on_notify(move |notification, host| {
        let target = match notification {
            Notification::ProbeDeploy => ProbePosition::Deployed,
            Notification::ProbeStow => ProbePosition::Stowed,
            _ => return Dispatch::Continue,
        };
        if let Err(e) = p.borrow_mut().move_to(target, host) {
            error!("Probe: {:?} failed: {}", target, e);
        }
        Dispatch::Continue
    });

    reg.bus().on_command_parse(|req, _host| {
        if req.is_mcode(401) {
            req.claim(DEPLOY)
        } else if req.is_mcode(402) {
            req.claim(STOW)
        } else {
            Dispatch::Continue
        }
    });

    let p = Rc::clone(&probe);
    reg.bus().on_command_exec(move |req, host| {
        let target = match req.claim {
            DEPLOY => ProbePosition::Deployed,
            STOW => ProbePosition::Stowed,
            _ => return Dispatch::Continue,
        };
        host.motion().buffer_synchronize();
        let result = p.borrow_mut().move_to(target, host);
        req.complete(result.map_err(|e| actuator_status("Probe", e)))
    });

    Ok(probe)
}
