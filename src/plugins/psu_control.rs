//! ATX-style power supply switch: M80 on, M81 off.
//!
//! M80 switches the supply on and waits the power-good delay ($410,
//! bounded) before the next line runs.  M81 waits for queued motion,
//! then switches off.

use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::OutputPin;
use log::info;
use serde::{Deserialize, Serialize};

use super::{actuator_status, drive, millis};
use crate::app::ports::Host;
use crate::app::service::Registrar;
use crate::command::Claim;
use crate::error::{ActuatorError, Error};
use crate::events::Dispatch;
use crate::settings::{PersistedSettings, SettingDescriptor, SettingFormat, SettingsHandle};
use crate::status::Status;

pub const POWER_GOOD_MS_ID: u16 = 410;

const POWER_ON: Claim = Claim::mcode(80);
const POWER_OFF: Claim = Claim::mcode(81);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsuSettings {
    pub power_good_ms: u16,
}

impl Default for PsuSettings {
    fn default() -> Self {
        Self {
            power_good_ms: 1000,
        }
    }
}

impl PersistedSettings for PsuSettings {
    const SIZE: u16 = 4;
    const DESCRIPTORS: &'static [SettingDescriptor] = &[SettingDescriptor {
        id: POWER_GOOD_MS_ID,
        name: "PSU power-good delay, ms",
        format: SettingFormat::Integer,
    }];

    fn value(&self, id: u16) -> Option<f32> {
        (id == POWER_GOOD_MS_ID).then(|| f32::from(self.power_good_ms))
    }

    fn apply(&mut self, id: u16, value: f32) -> Status {
        if id != POWER_GOOD_MS_ID {
            return Status::InvalidStatement;
        }
        match millis(value) {
            Ok(ms) => {
                self.power_good_ms = ms;
                Status::Ok
            }
            Err(status) => status,
        }
    }
}

pub struct Psu<P> {
    pin: P,
    settings: SettingsHandle<PsuSettings>,
    max_delay_ms: u32,
    on: bool,
}

impl<P: OutputPin> Psu<P> {
    fn switch(&mut self, on: bool, host: &mut dyn Host) -> Result<(), ActuatorError> {
        if on {
            drive(&mut self.pin, true)?;
            let wait = u32::from(self.settings.borrow().power_good_ms);
            host.delay().delay_ms(wait.min(self.max_delay_ms));
        } else {
            host.motion().buffer_synchronize();
            drive(&mut self.pin, false)?;
        }
        self.on = on;
        info!("PSU: {}", if on { "on" } else { "off" });
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn settings(&self) -> &SettingsHandle<PsuSettings> {
        &self.settings
    }
}

pub fn install<P: OutputPin + 'static>(
    reg: &mut Registrar,
    pin: P,
) -> Result<Rc<RefCell<Psu<P>>>, Error> {
    let settings = reg.register_settings::<PsuSettings>("psu_control")?;
    let max_delay_ms = reg.config().max_blocking_delay_ms;
    let psu = Rc::new(RefCell::new(Psu {
        pin,
        settings,
        max_delay_ms,
        on: false,
    }));

    reg.bus().on_command_parse(|req, _host| {
        if req.is_mcode(80) {
            req.claim(POWER_ON)
        } else if req.is_mcode(81) {
            req.claim(POWER_OFF)
        } else {
            Dispatch::Continue
        }
    });

    let p = Rc::clone(&psu);
    reg.bus().on_command_exec(move |req, host| {
        let on = match req.claim {
            POWER_ON => true,
            POWER_OFF => false,
            _ => return Dispatch::Continue,
        };
        let result = p.borrow_mut().switch(on, host);
        req.complete(result.map_err(|e| actuator_status("PSU", e)))
    });

    Ok(psu)
}
