//! Integration tests: claim/execute protocol across several extensions.

use std::cell::Cell;
use std::rc::Rc;

use cncext::app::events::AppEvent;
use cncext::app::service::{ExtensionHost, Registrar};
use cncext::command::line::WORD_REPEATED;
use cncext::command::{Claim, ExecRequest, ParseRequest, Word, Words};
use cncext::config::HostConfig;
use cncext::events::{Dispatch, Event, EventBus};
use cncext::plugins::coord_save::StoredPositions;
use cncext::plugins::{coord_save, pin_io, psu_control};
use cncext::settings::SettingsHandle;
use cncext::status::Status;

use crate::mock_hw::{MockHost, MockPin, RecordingSink};

struct Rig {
    ext: ExtensionHost,
    host: MockHost,
    sink: RecordingSink,
    pins: Vec<MockPin>,
    psu: MockPin,
    positions: SettingsHandle<StoredPositions>,
}

impl Rig {
    fn new() -> Self {
        Self::boot(MockHost::new(HostConfig::default().nvs_size))
    }

    /// Register the extensions and start them against `host`, whose
    /// storage may already hold a previous boot's settings.
    fn boot(mut host: MockHost) -> Self {
        let config = HostConfig::default();
        let mut reg = Registrar::new(config.clone()).unwrap();
        let pins: Vec<MockPin> = (0..64).map(|_| MockPin::default()).collect();
        pin_io::install(&mut reg, pins.clone()).unwrap();
        let psu = MockPin::default();
        psu_control::install(&mut reg, psu.clone()).unwrap();
        let positions = coord_save::install(&mut reg).unwrap();

        let mut ext = reg.finish();
        let mut sink = RecordingSink::default();
        ext.start(&mut host, &mut sink).unwrap();
        Self {
            ext,
            host,
            sink,
            pins,
            psu,
            positions,
        }
    }

    fn run(&mut self, line: &str) -> Result<Option<Claim>, Status> {
        self.ext.execute_line(&mut self.host, line, &mut self.sink)
    }
}

#[test]
fn single_matching_extension_owns_and_executes() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("M64 P10"), Ok(Some(Claim::mcode(64))));
    assert!(rig.pins[10].level());
    assert_eq!(rig.pins[10].writes(), 1);
}

#[test]
fn synchronized_output_waits_for_motion() {
    let mut rig = Rig::new();
    let before = rig.host.machine.synchronizations();
    assert_eq!(rig.run("M62 P3"), Ok(Some(Claim::mcode(62))));
    assert_eq!(rig.host.machine.synchronizations(), before + 1);
    assert!(rig.pins[3].level());
}

#[test]
fn second_claim_on_a_line_is_a_modal_group_violation() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("M64 M80 P1"), Err(Status::ModalGroupViolation));
    assert_eq!(rig.pins[1].writes(), 0);
    assert_eq!(rig.psu.writes(), 0);
}

#[test]
fn violation_preserves_the_earlier_claim() {
    let mut reg = Registrar::new(HostConfig::default()).unwrap();
    psu_control::install(&mut reg, MockPin::default()).unwrap();
    let mut bus: EventBus = std::mem::take(reg.bus());
    let mut host = MockHost::new(2048);

    let word = Word {
        letter: 'M',
        value: 80.0,
    };
    let mut req = ParseRequest::new(word, Claim::mcode(64));
    let result = bus.publish(Event::CommandParse(&mut req), &mut host);
    assert_eq!(result, Dispatch::Handled);
    assert_eq!(req.status, Status::ModalGroupViolation);
    assert_eq!(req.claim, Claim::mcode(64));
}

#[test]
fn registration_order_decides_identical_predicates() {
    let mut reg = Registrar::new(HostConfig::default()).unwrap();
    let executed: Rc<Cell<[u32; 2]>> = Rc::default();

    // Both predicates match M100; each would tag the line differently.
    for (index, tag) in [(0usize, Claim::mcode(100)), (1, Claim::mcode(101))] {
        reg.bus().on_command_parse(move |req, _host| {
            if req.is_mcode(100) {
                req.claim(tag)
            } else {
                Dispatch::Continue
            }
        });
        let executed = Rc::clone(&executed);
        reg.bus().on_command_exec(move |req, _host| {
            if req.claim != tag {
                return Dispatch::Continue;
            }
            let mut counts = executed.get();
            counts[index] += 1;
            executed.set(counts);
            req.complete(Ok(()))
        });
    }

    let mut ext = reg.finish();
    let mut host = MockHost::new(2048);
    let mut sink = RecordingSink::default();
    assert_eq!(
        ext.execute_line(&mut host, "M100", &mut sink),
        Ok(Some(Claim::mcode(100)))
    );
    assert_eq!(executed.get(), [1, 0]);
}

#[test]
fn decimal_sub_code_is_claimed_only_by_its_mantissa() {
    let mut rig = Rig::new();
    rig.host.machine.position = [10.0, -20.5, 3.25];

    assert_eq!(rig.run("G28.1"), Ok(Some(Claim::sub_code(28, 10))));
    assert_eq!(rig.positions.borrow().g28, [10.0, -20.5, 3.25]);

    // Plain G28 belongs to the host.
    assert_eq!(rig.run("G28"), Ok(None));

    rig.host.machine.position = [1.0, 2.0, 3.0];
    assert_eq!(rig.run("G30.1"), Ok(Some(Claim::sub_code(30, 10))));
    assert_eq!(rig.positions.borrow().g30, [1.0, 2.0, 3.0]);
    assert_eq!(rig.positions.borrow().g28, [10.0, -20.5, 3.25]);
}

#[test]
fn stored_positions_survive_reboot() {
    let mut rig = Rig::new();
    rig.host.machine.position = [10.0, -20.5, 3.25];
    assert_eq!(rig.run("G28.1"), Ok(Some(Claim::sub_code(28, 10))));
    rig.host.machine.position = [1.0, 2.0, 3.0];
    assert_eq!(rig.run("G30.1"), Ok(Some(Claim::sub_code(30, 10))));

    let rig = Rig::boot(rig.host);
    assert!(!rig.sink.events.contains(&AppEvent::SettingsRestored));
    assert_eq!(rig.positions.borrow().g28, [10.0, -20.5, 3.25]);
    assert_eq!(rig.positions.borrow().g30, [1.0, 2.0, 3.0]);
}

#[test]
fn unpersisted_position_fails_the_line() {
    let mut rig = Rig::new();
    rig.host.nvs.fail_writes = true;
    rig.host.machine.position = [4.0, 5.0, 6.0];
    assert_eq!(rig.run("G28.1"), Err(Status::InvalidStatement));

    rig.host.nvs.fail_writes = false;
    let rig = Rig::boot(rig.host);
    assert_eq!(rig.positions.borrow().g28, [0.0; 3]);
}

#[test]
fn pin_outside_local_range_is_left_unhandled() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("M64 P70"), Err(Status::ExtendedUnsupported));
    assert!(rig.pins.iter().all(|p| p.writes() == 0));
}

#[test]
fn exec_listener_continues_for_foreign_pins() {
    let mut reg = Registrar::new(HostConfig::default()).unwrap();
    let pins: Vec<MockPin> = (0..64).map(|_| MockPin::default()).collect();
    pin_io::install(&mut reg, pins.clone()).unwrap();
    let mut host = MockHost::new(2048);

    let mut words = Words::default();
    words.insert('P', 10.0);
    let mut req = ExecRequest::new(Claim::mcode(64), words);
    assert_eq!(
        reg.bus().publish(Event::CommandExec(&mut req), &mut host),
        Dispatch::Handled
    );
    assert_eq!(req.status, Status::Ok);
    assert!(pins[10].level());

    let mut words = Words::default();
    words.insert('P', 70.0);
    let mut req = ExecRequest::new(Claim::mcode(64), words);
    assert_eq!(
        reg.bus().publish(Event::CommandExec(&mut req), &mut host),
        Dispatch::Continue
    );
}

#[test]
fn missing_and_negative_words_reject_the_line() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("M64"), Err(Status::ValueWordMissing));
    assert_eq!(rig.run("M65 P-2"), Err(Status::NegativeValue));
}

#[test]
fn unclaimed_lines_pass_through() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("G1 X10 Y5 F300"), Ok(None));
    assert_eq!(rig.run("(just a comment)"), Ok(None));
}

#[test]
fn tokenizer_errors_surface_as_passthrough_codes() {
    let mut rig = Rig::new();
    let err = rig.run("M64 P1 P2").unwrap_err();
    assert_eq!(err, WORD_REPEATED);
    assert_eq!(err.code(), 25);
}

#[test]
fn power_on_waits_power_good_and_off_synchronizes() {
    let mut rig = Rig::new();
    assert_eq!(rig.run("M80"), Ok(Some(Claim::mcode(80))));
    assert!(rig.psu.level());
    assert_eq!(rig.host.machine.total_delay_ms(), 1000);

    let before = rig.host.machine.synchronizations();
    assert_eq!(rig.run("M81"), Ok(Some(Claim::mcode(81))));
    assert!(!rig.psu.level());
    assert_eq!(rig.host.machine.synchronizations(), before + 1);
}
