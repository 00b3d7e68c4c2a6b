//! G28.1 / G30.1: store the current machine position as a predefined
//! position.
//!
//! Only the `.1` sub-codes are claimed.  Plain G28 / G30 (mantissa 0)
//! fall through to the host, which moves to the stored position.

use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::app::ports::N_AXIS;
use crate::app::service::Registrar;
use crate::command::{Claim, ParseRequest};
use crate::error::Error;
use crate::events::Dispatch;
use crate::settings::{PersistedSettings, SettingDescriptor, SettingsHandle};
use crate::status::Status;

const SET_SUB_CODE: u16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    G28,
    G30,
}

impl Slot {
    const fn code(self) -> u16 {
        match self {
            Self::G28 => 28,
            Self::G30 => 30,
        }
    }

    const fn claim(self) -> Claim {
        Claim::sub_code(self.code(), SET_SUB_CODE)
    }

    fn matching(req: &ParseRequest) -> Option<Self> {
        [Self::G28, Self::G30]
            .into_iter()
            .find(|slot| req.is('G', slot.code()) && req.mantissa() == SET_SUB_CODE)
    }
}

/// Both predefined positions, in machine coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StoredPositions {
    pub g28: [f32; N_AXIS],
    pub g30: [f32; N_AXIS],
}

impl StoredPositions {
    pub fn get(&self, slot: Slot) -> [f32; N_AXIS] {
        match slot {
            Slot::G28 => self.g28,
            Slot::G30 => self.g30,
        }
    }

    fn set(&mut self, slot: Slot, position: [f32; N_AXIS]) {
        match slot {
            Slot::G28 => self.g28 = position,
            Slot::G30 => self.g30 = position,
        }
    }
}

impl PersistedSettings for StoredPositions {
    const SIZE: u16 = (2 * N_AXIS * 4) as u16;
    const DESCRIPTORS: &'static [SettingDescriptor] = &[];

    fn value(&self, _id: u16) -> Option<f32> {
        None
    }

    fn apply(&mut self, _id: u16, _value: f32) -> Status {
        Status::InvalidStatement
    }
}

pub fn install(reg: &mut Registrar) -> Result<SettingsHandle<StoredPositions>, Error> {
    let positions = reg.register_settings::<StoredPositions>("coord_save")?;

    reg.bus().on_command_parse(|req, _host| match Slot::matching(req) {
        Some(slot) => req.claim(slot.claim()),
        None => Dispatch::Continue,
    });

    let handle = positions.clone();
    reg.bus().on_command_exec(move |req, host| {
        let slot = match req.claim {
            c if c == Slot::G28.claim() => Slot::G28,
            c if c == Slot::G30.claim() => Slot::G30,
            _ => return Dispatch::Continue,
        };
        host.motion().buffer_synchronize();
        let position = host.motion().machine_position();
        handle.borrow_mut().set(slot, position);
        let result = handle.save(host.nvs()).map_err(|e| {
            error!("CoordSave: {:?} not persisted: {}", slot, e);
            Status::InvalidStatement
        });
        if result.is_ok() {
            info!("CoordSave: {:?} = {:?}", slot, position);
        }
        req.complete(result)
    });

    Ok(positions)
}
