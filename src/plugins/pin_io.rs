//! Digital output control: M62-M65.
//!
//! | Code | Action                                       |
//! |------|----------------------------------------------|
//! | M62  | output on, after queued motion completes     |
//! | M63  | output off, after queued motion completes    |
//! | M64  | output on, immediately                       |
//! | M65  | output off, immediately                      |
//!
//! `P` selects the output.  A bank owns only the pin numbers in its own
//! range: it claims the code at PARSE but answers `Continue` at EXEC for
//! any `P` outside that range, leaving the line to a later bank or to the
//! host.  Several banks can therefore split one code family.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;

use embedded_hal::digital::OutputPin;
use log::{debug, info};

use super::{actuator_status, drive};
use crate::app::service::Registrar;
use crate::app::ports::Host;
use crate::command::{Claim, ParseRequest};
use crate::error::Error;
use crate::events::Dispatch;

const CODES: [u16; 4] = [62, 63, 64, 65];

/// A contiguous range of outputs addressed by `P`.
pub struct PinBank<P> {
    first: u16,
    pins: Vec<P>,
}

impl<P: OutputPin> PinBank<P> {
    /// `pins[i]` answers to `P<first + i>`.
    pub fn new(first: u16, pins: Vec<P>) -> Self {
        Self { first, pins }
    }

    pub fn range(&self) -> Range<u16> {
        self.first..self.first + self.pins.len() as u16
    }

    fn local(&mut self, pin: f32) -> Option<&mut P> {
        let pin = pin as u32;
        let index = pin.checked_sub(u32::from(self.first))? as usize;
        self.pins.get_mut(index)
    }
}

/// Register a bank using the configured first pin and count.
///
/// Extra pins beyond `pin_io_pin_count` are rejected rather than ignored.
pub fn install<P: OutputPin + 'static>(reg: &mut Registrar, pins: Vec<P>) -> Result<(), Error> {
    let config = reg.config();
    if pins.len() > usize::from(config.pin_io_pin_count) {
        return Err(Error::Config("more pins than pin_io_pin_count"));
    }
    let first = u16::from(config.pin_io_first_pin);
    install_bank(reg, PinBank::new(first, pins));
    Ok(())
}

/// Register an explicit bank.  Banks installed later see only the pin
/// numbers earlier banks declined.
pub fn install_bank<P: OutputPin + 'static>(reg: &mut Registrar, bank: PinBank<P>) {
    let range = bank.range();
    info!("PinIo: bank P{}..P{} registered", range.start, range.end);
    let bank = Rc::new(RefCell::new(bank));

    reg.bus().on_command_parse(on_parse);

    reg.bus().on_command_exec(move |req, host| {
        let Some(code) = CODES.into_iter().find(|&c| req.claim == Claim::mcode(c)) else {
            return Dispatch::Continue;
        };
        let pin = match req.words.require_unsigned('P') {
            Ok(p) => p,
            Err(status) => return req.complete(Err(status)),
        };

        let mut bank = bank.borrow_mut();
        let Some(output) = bank.local(pin) else {
            debug!("PinIo: P{} outside {:?}, passing on", pin, range);
            return Dispatch::Continue;
        };

        if code == 62 || code == 63 {
            host.motion().buffer_synchronize();
        }
        let on = code == 62 || code == 64;
        req.complete(drive(output, on).map_err(|e| actuator_status("PinIo", e)))
    });
}

/// Claim the code family.  Every bank registers the same predicate; only
/// the first one ever runs for a given word.
fn on_parse(req: &mut ParseRequest, _host: &mut dyn Host) -> Dispatch {
    match CODES.into_iter().find(|&c| req.is_mcode(c)) {
        Some(code) => req.claim(Claim::mcode(code)),
        None => Dispatch::Continue,
    }
}
