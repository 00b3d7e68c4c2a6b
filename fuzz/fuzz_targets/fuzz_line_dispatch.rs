//! Fuzz target: `Line::parse` + `ExtensionHost::execute_line`
//!
//! Feeds arbitrary text through the tokenizer and the PARSE/EXEC
//! protocol with the stock extensions installed.  Must never panic, and
//! an executed line must always carry a claim.
//!
//! cargo fuzz run fuzz_line_dispatch

#![no_main]

use cncext::adapters::sim::{SimHost, SimPin};
use cncext::app::ports::EventSink;
use cncext::app::events::AppEvent;
use cncext::app::service::Registrar;
use cncext::command::Line;
use cncext::config::HostConfig;
use cncext::plugins::{coord_save, pin_io, psu_control, stepper_enable};
use libfuzzer_sys::fuzz_target;

struct Discard;

impl EventSink for Discard {
    fn emit(&mut self, _event: &AppEvent) {}
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let _ = Line::parse(text);

    let config = HostConfig {
        pin_io_pin_count: 8,
        ..HostConfig::default()
    };
    let Ok(mut reg) = Registrar::new(config) else {
        return;
    };
    let pins: Vec<SimPin> = (0..8).map(|_| SimPin::new()).collect();
    if pin_io::install(&mut reg, pins).is_err()
        || psu_control::install(&mut reg, SimPin::new()).is_err()
        || coord_save::install(&mut reg).is_err()
    {
        return;
    }
    stepper_enable::install(&mut reg);

    let mut ext = reg.finish();
    let mut host = SimHost::new(2048);
    if ext.start(&mut host, &mut Discard).is_err() {
        return;
    }
    if let Ok(Some(claim)) = ext.execute_line(&mut host, text, &mut Discard) {
        assert!(claim.is_claimed(), "executed line without an owner");
    }
});
