//! Integration tests: torch height control driven through the extension
//! host (notifications, periodic ticks, live setting changes).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use cncext::adapters::sim::SimArcSensor;
use cncext::app::commands::AppCommand;
use cncext::app::service::{ExtensionHost, Registrar};
use cncext::config::HostConfig;
use cncext::control::threshold::Actuation;
use cncext::events::{Dispatch, Notification};
use cncext::plugins::plasma_thc::{self, PlasmaThc, ThcOutputs};
use cncext::status::Status;

use crate::mock_hw::{MockHost, MockPin, RecordingSink};

struct Torch {
    ext: ExtensionHost,
    host: MockHost,
    thc: Rc<RefCell<PlasmaThc<SimArcSensor, MockPin>>>,
    volts: Rc<Cell<f32>>,
    up: MockPin,
    down: MockPin,
    ok: MockPin,
    now_ms: u32,
}

impl Torch {
    fn boot(host: MockHost) -> Self {
        let mut reg = Registrar::new(HostConfig::default()).unwrap();
        let sensor = SimArcSensor::new(120.0);
        let volts = sensor.probe();
        let (up, down, ok) = (MockPin::default(), MockPin::default(), MockPin::default());
        let outputs = ThcOutputs {
            up: up.clone(),
            down: down.clone(),
            arc_ok: ok.clone(),
        };
        let thc = plasma_thc::install(&mut reg, sensor, outputs).unwrap();
        let mut torch = Self {
            ext: reg.finish(),
            host,
            thc,
            volts,
            up,
            down,
            ok,
            now_ms: 0,
        };
        torch
            .ext
            .start(&mut torch.host, &mut RecordingSink::default())
            .unwrap();
        torch
    }

    fn new() -> Self {
        Self::boot(MockHost::new(2048))
    }

    /// Advance the clock by `ms`, ticking every millisecond.
    fn run(&mut self, ms: u32) {
        for _ in 0..ms {
            self.ext.tick(&mut self.host, self.now_ms);
            self.now_ms += 1;
        }
    }

    fn command(&mut self, line: &str) -> Status {
        let cmd = AppCommand::parse(line).unwrap();
        self.ext
            .handle_command(&mut self.host, cmd, &mut RecordingSink::default())
            .status
    }

    fn notify(&mut self, n: Notification) -> Dispatch {
        self.ext.notify(&mut self.host, n)
    }

    fn decision(&self) -> Actuation {
        self.thc.borrow().last_decision()
    }
}

#[test]
fn torch_notifications_are_observed_by_every_listener() {
    let mut torch = Torch::new();
    assert_eq!(torch.notify(Notification::TorchOn), Dispatch::Continue);
    assert!(torch.thc.borrow().is_torch_on());
    assert_eq!(torch.notify(Notification::TorchOff), Dispatch::Continue);
    assert!(!torch.thc.borrow().is_torch_on());
}

#[test]
fn low_arc_drives_torch_down() {
    let mut torch = Torch::new();
    torch.volts.set(110.0);
    torch.notify(Notification::TorchOn);
    torch.run(25);

    assert!(torch.down.level());
    assert!(!torch.up.level());
    assert!(!torch.ok.level());
}

#[test]
fn no_output_without_torch() {
    let mut torch = Torch::new();
    torch.volts.set(80.0);
    torch.run(200);
    assert_eq!(torch.decision(), Actuation::IDLE);
    assert_eq!(torch.down.writes(), 0);
}

#[test]
fn live_setpoint_change_takes_effect_on_next_sample() {
    let mut torch = Torch::new();
    torch.volts.set(100.0);
    torch.notify(Notification::TorchOn);
    torch.run(25);
    assert!(torch.down.level());

    assert_eq!(torch.command("$350=100"), Status::Ok);
    torch.run(25);
    assert!(!torch.down.level());
    assert!(torch.ok.level());
}

#[test]
fn rate_change_applies_at_next_torch_on() {
    let mut torch = Torch::new();
    assert_eq!(torch.command("$354=10"), Status::Ok);
    torch.volts.set(100.0);
    torch.notify(Notification::TorchOn);

    torch.run(60);
    assert_eq!(torch.decision(), Actuation::IDLE);
    torch.run(50);
    assert!(torch.decision().down);
}

#[test]
fn invalid_thc_settings_are_rejected() {
    let mut torch = Torch::new();
    assert_eq!(torch.command("$354=0"), Status::InvalidStatement);
    assert_eq!(torch.command("$351=-2"), Status::NegativeValue);
    assert_eq!(torch.thc.borrow().settings().borrow().rate_hz, 50);
}

#[test]
fn thc_settings_report_as_decimals_and_persist() {
    let mut torch = Torch::new();
    assert_eq!(torch.command("$350=95.5"), Status::Ok);

    let reply = torch.ext.handle_command(
        &mut torch.host,
        AppCommand::ReportSetting(350),
        &mut RecordingSink::default(),
    );
    assert_eq!(reply.lines, vec!["$350=95.500"]);

    let rebooted = Torch::boot(torch.host);
    assert_eq!(rebooted.thc.borrow().settings().borrow().setpoint_v, 95.5);
}

#[test]
fn torch_off_releases_every_output() {
    let mut torch = Torch::new();
    torch.volts.set(130.0);
    torch.notify(Notification::TorchOn);
    torch.run(25);
    assert!(torch.up.level());

    torch.notify(Notification::TorchOff);
    assert!(!torch.up.level());
    assert!(!torch.down.level());
    assert!(!torch.ok.level());
}
