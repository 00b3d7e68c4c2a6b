//! Integration tests: settings registry, lifecycle and layout fingerprint.

use std::cell::RefCell;
use std::rc::Rc;

use cncext::adapters::sim::SimServo;
use cncext::app::commands::AppCommand;
use cncext::app::events::AppEvent;
use cncext::app::ports::NvsPort;
use cncext::app::service::{ExtensionHost, Registrar};
use cncext::config::HostConfig;
use cncext::plugins::probe_deploy::{self, ProbeServo};
use cncext::plugins::psu_control::{self, Psu};
use cncext::settings::BlockAddress;
use cncext::status::Status;

use crate::mock_hw::{MockHost, MockPin, RecordingSink};

struct Booted {
    ext: ExtensionHost,
    probe: Rc<RefCell<ProbeServo<SimServo>>>,
    psu: Rc<RefCell<Psu<MockPin>>>,
}

/// Register probe + PSU (or PSU + probe) without starting.
fn register(psu_first: bool) -> Booted {
    let mut reg = Registrar::new(HostConfig::default()).unwrap();
    let (probe, psu) = if psu_first {
        let psu = psu_control::install(&mut reg, MockPin::default()).unwrap();
        (probe_deploy::install(&mut reg, SimServo::new()).unwrap(), psu)
    } else {
        let probe = probe_deploy::install(&mut reg, SimServo::new()).unwrap();
        (probe, psu_control::install(&mut reg, MockPin::default()).unwrap())
    };
    Booted {
        ext: reg.finish(),
        probe,
        psu,
    }
}

fn boot(host: &mut MockHost, sink: &mut RecordingSink) -> Booted {
    let mut booted = register(false);
    booted.ext.start(host, sink).unwrap();
    booted
}

fn change(b: &mut Booted, host: &mut MockHost, line: &str) -> Status {
    let cmd = AppCommand::parse(line).unwrap();
    b.ext
        .handle_command(host, cmd, &mut RecordingSink::default())
        .status
}

#[test]
fn blocks_are_allocated_in_registration_order() {
    let mut reg = Registrar::new(HostConfig::default()).unwrap();
    let base = reg.config().extension_base;
    assert_eq!(reg.register_external_setting("four", 4).unwrap(), BlockAddress::new(base));
    assert_eq!(reg.register_external_setting("two", 2).unwrap(), BlockAddress::new(base + 4));
    assert_eq!(reg.footprint(), 6);

    let ext = reg.finish();
    assert_eq!(ext.manifest().footprint(), 6);
    assert_eq!(ext.manifest().base(), base);
}

#[test]
fn first_boot_restores_then_second_boot_loads() {
    let mut host = MockHost::new(2048);
    let mut sink = RecordingSink::default();
    boot(&mut host, &mut sink);
    assert!(sink.events.contains(&AppEvent::SettingsRestored));

    let mut sink = RecordingSink::default();
    boot(&mut host, &mut sink);
    assert!(!sink.events.contains(&AppEvent::SettingsRestored));
    assert!(matches!(
        sink.events.last(),
        Some(AppEvent::Started {
            blocks: 2,
            restored_defaults: false,
            ..
        })
    ));
}

#[test]
fn live_change_survives_reboot() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    let writes = host.nvs.writes;
    assert_eq!(change(&mut b, &mut host, "$410=250"), Status::Ok);
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 250);
    assert_eq!(host.nvs.writes, writes + 1);

    let b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 250);
}

#[test]
fn read_failure_halts_load() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(change(&mut b, &mut host, "$410=250"), Status::Ok);
    let probe_block = b.probe.borrow().settings().address();
    let psu_block = b.psu.borrow().settings().address();

    host.nvs.fail_reads_at = Some(probe_block.get());
    let mut b = register(false);
    let mut sink = RecordingSink::default();
    assert_eq!(b.ext.start(&mut host, &mut sink), Err(Status::SettingReadFail));
    assert_eq!(
        sink.events,
        vec![AppEvent::SettingsLoadFailed(Status::SettingReadFail)]
    );
    // The PSU block sits after the failing one and was never loaded.
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 1000);

    // Its own address still loads.
    assert_eq!(b.ext.load_block(&mut host, Some(psu_block)), Ok(()));
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 250);
}

#[test]
fn reordered_layout_restores_defaults() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(change(&mut b, &mut host, "$410=250"), Status::Ok);

    let mut b = register(true);
    let mut sink = RecordingSink::default();
    b.ext.start(&mut host, &mut sink).unwrap();
    assert!(sink.events.contains(&AppEvent::SettingsRestored));
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 1000);
}

#[test]
fn undecodable_block_restores_its_defaults() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(change(&mut b, &mut host, "$410=250"), Status::Ok);
    let psu_block = b.psu.borrow().settings().address();
    host.nvs.write(psu_block.get(), &[0xFF; 4]).unwrap();

    let b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 1000);

    // The block was rewritten with a decodable value.
    let b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(b.psu.borrow().settings().borrow().power_good_ms, 1000);
}

#[test]
fn report_lists_every_extension_setting() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());

    let reply = b
        .ext
        .handle_command(&mut host, AppCommand::ReportSettings, &mut RecordingSink::default());
    assert_eq!(reply.lines, vec!["$400=5", "$401=10", "$402=500", "$410=1000"]);
    assert_eq!(reply.terminator(), "ok");

    let reply = b
        .ext
        .handle_command(&mut host, AppCommand::ReportSetting(402), &mut RecordingSink::default());
    assert_eq!(reply.lines, vec!["$402=500"]);

    let reply = b
        .ext
        .handle_command(&mut host, AppCommand::ReportSetting(999), &mut RecordingSink::default());
    assert_eq!(reply.terminator(), "error:3");
}

#[test]
fn change_outcomes() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());

    assert_eq!(change(&mut b, &mut host, "$999=1"), Status::InvalidStatement);
    assert_eq!(change(&mut b, &mut host, "$402=-5"), Status::NegativeValue);
    assert_eq!(change(&mut b, &mut host, "$400=150"), Status::InvalidStatement);
    assert_eq!(change(&mut b, &mut host, "$400=8"), Status::Ok);
    assert_eq!(b.probe.borrow().settings().borrow().deploy_percent, 8);
}

#[test]
fn restore_defaults_resets_and_persists() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(change(&mut b, &mut host, "$402=40"), Status::Ok);
    assert_eq!(change(&mut b, &mut host, "$RST=$"), Status::Ok);
    assert_eq!(b.probe.borrow().settings().borrow().settle_ms, 500);

    let b = boot(&mut host, &mut RecordingSink::default());
    assert_eq!(b.probe.borrow().settings().borrow().settle_ms, 500);
}

#[test]
fn rejected_writes_fail_first_boot() {
    let mut host = MockHost::new(2048);
    host.nvs.fail_writes = true;
    let mut b = register(false);
    let mut sink = RecordingSink::default();

    assert_eq!(b.ext.start(&mut host, &mut sink), Err(Status::SettingReadFail));
    assert_eq!(
        sink.events,
        vec![AppEvent::SettingsLoadFailed(Status::SettingReadFail)]
    );
    assert_eq!(host.nvs.writes, 0);

    // Nothing was stamped, so a healthy boot still restores.
    host.nvs.fail_writes = false;
    let mut sink = RecordingSink::default();
    boot(&mut host, &mut sink);
    assert!(sink.events.contains(&AppEvent::SettingsRestored));
}

#[test]
fn rejected_writes_fail_restore_command() {
    let mut host = MockHost::new(2048);
    let mut b = boot(&mut host, &mut RecordingSink::default());
    host.nvs.fail_writes = true;

    let mut sink = RecordingSink::default();
    let reply = b.ext.handle_command(&mut host, AppCommand::RestoreDefaults, &mut sink);
    assert_eq!(reply.status, Status::InvalidStatement);
    assert_eq!(reply.terminator(), "error:3");
    assert!(!sink.events.contains(&AppEvent::SettingsRestored));
}
