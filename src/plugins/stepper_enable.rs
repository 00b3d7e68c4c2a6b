//! M17 / M18: enable or disable stepper drivers.
//!
//! Axis words select drivers (`M18 Z` releases only Z); no axis word
//! means all of them.  Both codes wait for queued motion first.

use log::info;

use crate::app::ports::{AxisMask, N_AXIS};
use crate::app::service::Registrar;
use crate::command::{Claim, Words};
use crate::events::Dispatch;

const ENABLE: Claim = Claim::mcode(17);
const DISABLE: Claim = Claim::mcode(18);

const AXIS_LETTERS: [char; N_AXIS] = ['X', 'Y', 'Z'];

fn axes(words: &Words) -> AxisMask {
    let mask = AXIS_LETTERS
        .iter()
        .enumerate()
        .filter(|(_, letter)| words.has(**letter))
        .fold(AxisMask::default(), |mask, (axis, _)| mask.with(axis));
    if mask.is_empty() { AxisMask::ALL } else { mask }
}

pub fn install(reg: &mut Registrar) {
    reg.bus().on_command_parse(|req, _host| {
        if req.is_mcode(17) {
            req.claim(ENABLE)
        } else if req.is_mcode(18) {
            req.claim(DISABLE)
        } else {
            Dispatch::Continue
        }
    });

    reg.bus().on_command_exec(|req, host| {
        let enable = match req.claim {
            ENABLE => true,
            DISABLE => false,
            _ => return Dispatch::Continue,
        };
        let mask = axes(&req.words);
        host.motion().buffer_synchronize();
        host.motion().set_steppers_enabled(mask, enable);
        info!(
            "Steppers: {} 0b{:03b}",
            if enable { "enabled" } else { "disabled" },
            mask.0
        );
        req.complete(Ok(()))
    });
}
