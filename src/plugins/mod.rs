//! Example extensions built on the event bus.
//!
//! Each plugin exposes one `install` function that is called during the
//! registration phase with the [`Registrar`](crate::app::service::Registrar).
//! Install order is registration order: it decides both listener
//! precedence and the layout of persisted blocks, so hosts must keep it
//! stable across builds.
//!
//! | Plugin             | Codes / events                      | Setting ids |
//! |--------------------|-------------------------------------|-------------|
//! | [`pin_io`]         | M62-M65 `P<pin>`                    | -           |
//! | [`probe_deploy`]   | M401/M402, probe notifications      | 400-402     |
//! | [`stepper_enable`] | M17/M18 `[X] [Y] [Z]`               | -           |
//! | [`psu_control`]    | M80/M81                             | 410         |
//! | [`coord_save`]     | G28.1/G30.1                         | -           |
//! | [`plasma_thc`]     | periodic task, torch notifications  | 350-356     |

pub mod coord_save;
pub mod pin_io;
pub mod plasma_thc;
pub mod probe_deploy;
pub mod psu_control;
pub mod stepper_enable;

use embedded_hal::digital::OutputPin;
use log::error;

use crate::error::ActuatorError;
use crate::status::Status;

/// Drive a digital output, folding the HAL error into [`ActuatorError`].
pub(crate) fn drive<P: OutputPin>(pin: &mut P, on: bool) -> Result<(), ActuatorError> {
    let result = if on { pin.set_high() } else { pin.set_low() };
    result.map_err(|_| ActuatorError::GpioWriteFailed)
}

/// Status for an EXEC whose output could not be driven.
pub(crate) fn actuator_status(plugin: &str, err: ActuatorError) -> Status {
    error!("{}: {}", plugin, err);
    Status::InvalidStatement
}

/// Percentage settings (0-100).
pub(crate) fn percent(value: f32) -> Result<u8, Status> {
    if value < 0.0 {
        return Err(Status::NegativeValue);
    }
    if value > 100.0 {
        return Err(Status::InvalidStatement);
    }
    Ok(value.round() as u8)
}

/// Millisecond settings stored as `u16`.
pub(crate) fn millis(value: f32) -> Result<u16, Status> {
    if value < 0.0 {
        return Err(Status::NegativeValue);
    }
    if value > f32::from(u16::MAX) {
        return Err(Status::InvalidStatement);
    }
    Ok(value.round() as u16)
}
