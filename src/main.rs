//! cncext-sim: drive the extension host from a script.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimHost (NVS image · machine · delays)   LogEventSink          │
//! │  SimPin × N   SimServo   SimArcSensor                          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │   ExtensionHost: EventBus · SettingsManifest           │    │
//! │  │   pin_io · probe · steppers · psu · coord_save · thc   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each script line is console input (`$$`, `$RST=$`, `$<id>=<value>`,
//! or a G-code line) answered with report lines and `ok` / `error:<n>`.
//! Lines starting with `!` drive the simulated machine instead:
//!
//! | Directive                | Effect                                   |
//! |--------------------------|------------------------------------------|
//! | `!wait <ms>`             | advance the clock, one tick per ms       |
//! | `!notify <event>`        | probe-deploy, probe-stow, torch-on, torch-off |
//! | `!volts <v>`             | set the simulated arc voltage            |
//! | `!pos <x> <y> <z>`       | set the machine position                 |

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{info, warn};

use cncext::adapters::log_sink::LogEventSink;
use cncext::adapters::nvs::NvsAdapter;
use cncext::adapters::sim::{SimArcSensor, SimHost, SimPin, SimServo};
use cncext::app::commands::{AppCommand, Reply};
use cncext::app::service::{ExtensionHost, Registrar};
use cncext::config::HostConfig;
use cncext::events::Notification;
use cncext::plugins::plasma_thc::ThcOutputs;
use cncext::plugins::{coord_save, pin_io, plasma_thc, probe_deploy, psu_control, stepper_enable};

/// Extension host simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Script to run (stdin when omitted)
    #[arg()]
    script: Option<PathBuf>,

    /// NVS image file; loaded at start and written back on exit
    #[arg(short, long)]
    nvs: Option<PathBuf>,

    /// Host configuration (JSON); defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Erase the NVS image before starting
    #[arg(long)]
    erase: bool,

    /// enable debug messages
    #[arg(short, long)]
    verbose: bool,
}

/// Simulated peripherals the script can poke.
struct Machine {
    host: SimHost,
    volts: std::rc::Rc<std::cell::Cell<f32>>,
    now_ms: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter(None, log::LevelFilter::Debug);
    }
    builder.init();

    // ── 1. Configuration ──────────────────────────────────────
    let config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<HostConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => HostConfig::default(),
    };
    config.validate()?;

    // ── 2. Storage ────────────────────────────────────────────
    let mut nvs = match &args.nvs {
        Some(path) if path.exists() => {
            let image = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            NvsAdapter::from_image(image, config.nvs_size)
        }
        _ => NvsAdapter::new(config.nvs_size),
    };
    if args.erase {
        nvs.erase_all();
        warn!("NVS image erased");
    }

    // ── 3. Register extensions (order fixes the layout) ──────
    let (mut ext, mut machine) = build(&config, nvs)?;

    // ── 4. Start: layout check + LOAD ─────────────────────────
    let mut sink = LogEventSink::new();
    ext.start(&mut machine.host, &mut sink)
        .map_err(|s| anyhow!("settings load failed: error:{}", s.code()))?;

    // ── 5. Script ─────────────────────────────────────────────
    let input: Box<dyn BufRead> = match &args.script {
        Some(path) => Box::new(io::BufReader::new(
            fs::File::open(path).with_context(|| format!("opening {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };
    let mut out = io::stdout().lock();

    for (number, line) in input.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(directive) = line.strip_prefix('!') {
            if let Err(e) = run_directive(directive, &mut ext, &mut machine) {
                warn!("line {}: {}", number + 1, e);
                writeln!(out, "[MSG:{}]", e)?;
            }
            continue;
        }

        let reply = match AppCommand::parse(line) {
            Ok(cmd) => ext.handle_command(&mut machine.host, cmd, &mut sink),
            Err(status) => Reply::status(status),
        };
        for report in &reply.lines {
            writeln!(out, "{}", report)?;
        }
        writeln!(out, "{}", reply.terminator())?;
    }

    // ── 6. Persist ────────────────────────────────────────────
    if let Some(path) = &args.nvs {
        fs::write(path, machine.host.nvs.image())
            .with_context(|| format!("writing {}", path.display()))?;
        info!("NVS image saved to {}", path.display());
    }
    Ok(())
}

fn build(config: &HostConfig, nvs: NvsAdapter) -> Result<(ExtensionHost, Machine)> {
    let mut reg = Registrar::new(config.clone())?;

    let pins: Vec<SimPin> = (0..config.pin_io_pin_count).map(|_| SimPin::new()).collect();
    pin_io::install(&mut reg, pins)?;
    probe_deploy::install(&mut reg, SimServo::new())?;
    stepper_enable::install(&mut reg);
    psu_control::install(&mut reg, SimPin::new())?;
    coord_save::install(&mut reg)?;

    let sensor = SimArcSensor::new(0.0);
    let volts = sensor.probe();
    let outputs = ThcOutputs {
        up: SimPin::new(),
        down: SimPin::new(),
        arc_ok: SimPin::new(),
    };
    plasma_thc::install(&mut reg, sensor, outputs)?;

    info!("Registered {} bytes of extension settings", reg.footprint());
    Ok((
        reg.finish(),
        Machine {
            host: SimHost::with_nvs(nvs),
            volts,
            now_ms: 0,
        },
    ))
}

fn run_directive(directive: &str, ext: &mut ExtensionHost, machine: &mut Machine) -> Result<()> {
    let mut parts = directive.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let number = |i: usize| -> Result<f32> {
        let text = args.get(i).ok_or_else(|| anyhow!("{name}: missing argument"))?;
        text.parse::<f32>()
            .with_context(|| format!("{name}: bad number '{text}'"))
    };

    match name {
        "wait" => {
            let ms = number(0)? as u32;
            for _ in 0..ms {
                machine.now_ms = machine.now_ms.wrapping_add(1);
                ext.tick(&mut machine.host, machine.now_ms);
            }
        }
        "notify" => {
            let notification = match args.first().copied() {
                Some("probe-deploy") => Notification::ProbeDeploy,
                Some("probe-stow") => Notification::ProbeStow,
                Some("torch-on") => Notification::TorchOn,
                Some("torch-off") => Notification::TorchOff,
                other => bail!("notify: unknown event {:?}", other),
            };
            ext.notify(&mut machine.host, notification);
        }
        "volts" => machine.volts.set(number(0)?),
        "pos" => {
            machine.host.machine.position = [number(0)?, number(1)?, number(2)?];
        }
        other => bail!("unknown directive '!{other}'"),
    }
    Ok(())
}
