//! Application service: the hexagonal core of the extension layer.
//!
//! Two phases, two types:
//!
//! * [`Registrar`]: init-time.  Extensions subscribe listeners and reserve
//!   settings blocks.  Nothing touches storage yet.
//! * [`ExtensionHost`]: run-time.  Owns the frozen bus and the settings
//!   manifest, and exposes a clean API the host firmware (or the
//!   simulator) drives.  All I/O flows through the [`Host`] and
//!   [`EventSink`] ports injected at call sites.
//!
//! ```text
//!  console ──▶ AppCommand ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!                             │      ExtensionHost        │
//!   Host ports ◀──────────────│  EventBus · Manifest      │
//!                             └──────────────────────────┘
//! ```

use log::{error, info, warn};

use crate::command::{Claim, Line, process_line};
use crate::config::HostConfig;
use crate::error::{Error, StorageError};
use crate::events::{Dispatch, Event, EventBus, Notification, Tick};
use crate::settings::registry::LAYOUT_TAG_LEN;
use crate::settings::{
    BlockAddress, BlockRequest, BlockTarget, ChangeRequest, LayoutBuilder, PersistedSettings,
    ReportRequest, SettingId, SettingsHandle, SettingsManifest,
};
use crate::status::Status;

use super::commands::{AppCommand, Reply};
use super::events::AppEvent;
use super::ports::{EventSink, Host};

// ───────────────────────────────────────────────────────────────
// Registration phase
// ───────────────────────────────────────────────────────────────

/// Collects listeners and settings blocks while extensions initialise.
pub struct Registrar {
    bus: EventBus,
    layout: LayoutBuilder,
    config: HostConfig,
}

impl Registrar {
    pub fn new(config: HostConfig) -> Result<Self, Error> {
        config.validate()?;
        let layout = LayoutBuilder::new(config.extension_base, config.nvs_size);
        Ok(Self {
            bus: EventBus::new(),
            layout,
            config,
        })
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Bus for listener subscription.
    pub fn bus(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Reserve a raw block; the caller subscribes its own lifecycle
    /// listeners.
    pub fn register_external_setting(
        &mut self,
        name: &'static str,
        size: u16,
    ) -> Result<BlockAddress, Error> {
        Ok(self.layout.register_external_setting(name, size)?)
    }

    pub fn claim_setting_id(&mut self, id: u16) -> Result<SettingId, Error> {
        Ok(self.layout.claim_setting_id(id)?)
    }

    /// Reserve a typed block and wire it to all five lifecycle events.
    pub fn register_settings<S: PersistedSettings>(
        &mut self,
        name: &'static str,
    ) -> Result<SettingsHandle<S>, Error> {
        Ok(SettingsHandle::attach(&mut self.bus, &mut self.layout, name)?)
    }

    pub fn footprint(&self) -> u16 {
        self.layout.footprint()
    }

    /// Freeze the bus and layout.
    pub fn finish(self) -> ExtensionHost {
        ExtensionHost {
            bus: self.bus,
            manifest: self.layout.finish(),
            config: self.config,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// ExtensionHost
// ───────────────────────────────────────────────────────────────

/// Run-time facade over the frozen extension set.
pub struct ExtensionHost {
    bus: EventBus,
    manifest: SettingsManifest,
    config: HostConfig,
}

impl ExtensionHost {
    // ── Lifecycle ─────────────────────────────────────────────

    /// Verify the persisted layout and load every settings block.
    ///
    /// A missing or stale layout tag restores all blocks to defaults
    /// instead of decoding bytes that belong to a different layout.
    pub fn start(&mut self, host: &mut dyn Host, sink: &mut impl EventSink) -> Result<(), Status> {
        let mut tag = [0u8; LAYOUT_TAG_LEN];
        if let Err(e) = host.nvs().read(self.config.layout_tag_address, &mut tag) {
            error!("ExtensionHost: layout tag unreadable: {}", e);
            sink.emit(&AppEvent::SettingsLoadFailed(Status::SettingReadFail));
            return Err(Status::SettingReadFail);
        }

        let restored = tag != self.manifest.fingerprint();
        if restored {
            warn!(
                "ExtensionHost: layout tag {:02x?} != {:02x?}, restoring defaults",
                tag,
                self.manifest.fingerprint()
            );
            if let Err(e) = self.restore_defaults(host, sink) {
                error!("ExtensionHost: default restore incomplete: {}", e);
                sink.emit(&AppEvent::SettingsLoadFailed(Status::SettingReadFail));
                return Err(Status::SettingReadFail);
            }
        } else if let Err(status) = self.load_settings(host) {
            sink.emit(&AppEvent::SettingsLoadFailed(status));
            return Err(status);
        }

        sink.emit(&AppEvent::Started {
            blocks: self.manifest.blocks().len(),
            footprint: self.manifest.footprint(),
            restored_defaults: restored,
        });
        info!(
            "ExtensionHost started: {} blocks, {} bytes",
            self.manifest.blocks().len(),
            self.manifest.footprint()
        );
        Ok(())
    }

    /// Publish LOAD to every block.  Stops at the first read failure.
    pub fn load_settings(&mut self, host: &mut dyn Host) -> Result<(), Status> {
        self.load_block(host, None)
    }

    /// LOAD for one block (`Some(address)`) or all of them.
    pub fn load_block(
        &mut self,
        host: &mut dyn Host,
        address: Option<BlockAddress>,
    ) -> Result<(), Status> {
        let mut req = match address {
            Some(a) => BlockRequest::new(BlockTarget::Address(a.get())),
            None => BlockRequest::all(),
        };
        self.bus.publish(Event::SettingsLoad(&mut req), host);
        req.status.into_result()
    }

    // ── Lines ─────────────────────────────────────────────────

    /// Tokenise and dispatch one G-code line.
    ///
    /// `Ok(None)` means no extension owns the line and the host's
    /// built-in handling should run.
    pub fn execute_line(
        &mut self,
        host: &mut dyn Host,
        text: &str,
        sink: &mut impl EventSink,
    ) -> Result<Option<Claim>, Status> {
        let result = Line::parse(text).and_then(|line| process_line(&mut self.bus, host, &line));
        match result {
            Ok(Some(claim)) => sink.emit(&AppEvent::LineExecuted(claim)),
            Ok(None) => sink.emit(&AppEvent::LinePassedThrough),
            Err(status) => sink.emit(&AppEvent::LineRejected(status)),
        }
        result
    }

    // ── Periodic / notifications ──────────────────────────────

    /// One pass of the host main loop.
    pub fn tick(&mut self, host: &mut dyn Host, now_ms: u32) {
        self.bus.publish(Event::PeriodicTask(Tick { now_ms }), host);
    }

    pub fn notify(&mut self, host: &mut dyn Host, notification: Notification) -> Dispatch {
        self.bus.publish(Event::Notify(notification), host)
    }

    // ── Settings ──────────────────────────────────────────────

    /// Live change of one extension setting.
    pub fn change_setting(
        &mut self,
        host: &mut dyn Host,
        id: u16,
        value: f32,
        sink: &mut impl EventSink,
    ) -> Result<(), Status> {
        let mut req = ChangeRequest::new(id, value);
        self.bus.publish(Event::SettingsChange(&mut req), host);
        req.status.into_result()?;
        sink.emit(&AppEvent::SettingChanged { id, value });
        Ok(())
    }

    /// Report lines for every setting, or just `filter`.
    pub fn report_settings(&mut self, host: &mut dyn Host, filter: Option<u16>) -> Vec<String> {
        let mut req = ReportRequest {
            filter,
            lines: Vec::new(),
        };
        self.bus.publish(Event::SettingsReport(&mut req), host);
        req.lines
    }

    /// Write every block back.
    pub fn save_settings(&mut self, host: &mut dyn Host) -> Result<(), Error> {
        let mut req = BlockRequest::all();
        self.bus.publish(Event::SettingsSave(&mut req), host);
        if req.write_failures > 0 {
            warn!("ExtensionHost: {} block(s) failed to save", req.write_failures);
            return Err(Error::Storage(StorageError::IoError));
        }
        Ok(())
    }

    /// ERASE then SAVE every block, then stamp the current layout tag.
    pub fn restore_defaults(
        &mut self,
        host: &mut dyn Host,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        let mut req = BlockRequest::all();
        self.bus.publish(Event::SettingsErase(&mut req), host);
        self.save_settings(host)?;
        host.nvs()
            .write(self.config.layout_tag_address, &self.manifest.fingerprint())?;
        sink.emit(&AppEvent::SettingsRestored);
        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process one console command.
    pub fn handle_command(
        &mut self,
        host: &mut dyn Host,
        cmd: AppCommand,
        sink: &mut impl EventSink,
    ) -> Reply {
        match cmd {
            AppCommand::ReportSettings => Reply::ok_with(self.report_settings(host, None)),
            AppCommand::ReportSetting(id) => {
                let lines = self.report_settings(host, Some(id));
                if lines.is_empty() {
                    Reply::status(Status::InvalidStatement)
                } else {
                    Reply::ok_with(lines)
                }
            }
            AppCommand::RestoreDefaults => match self.restore_defaults(host, sink) {
                Ok(()) => Reply::status(Status::Ok),
                Err(e) => {
                    error!("ExtensionHost: restore failed: {}", e);
                    Reply::status(Status::InvalidStatement)
                }
            },
            AppCommand::ChangeSetting { id, value } => {
                Reply::from(self.change_setting(host, id, value, sink))
            }
            AppCommand::ExecuteLine(text) => {
                Reply::from(self.execute_line(host, &text, sink).map(|_| ()))
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn manifest(&self) -> &SettingsManifest {
        &self.manifest
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }
}
