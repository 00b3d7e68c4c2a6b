//! Lifecycle glue between one [`PersistedSettings`] block and the bus.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use log::{error, info, warn};

use super::registry::{BlockAddress, LayoutBuilder};
use super::{BlockRequest, ChangeRequest, PersistedSettings, ReportRequest, report_line};
use crate::app::ports::{Host, NvsPort};
use crate::error::{Error, RegistryError, StorageError};
use crate::events::{Dispatch, Event, EventBus, EventKind};
use crate::status::Status;

/// Shared handle to an extension's live settings.
///
/// Cloning is cheap; every clone sees the same value.  The bus keeps one
/// clone per lifecycle event, the owning extension keeps another.
pub struct SettingsHandle<S> {
    name: &'static str,
    address: BlockAddress,
    state: Rc<RefCell<S>>,
}

impl<S> Clone for SettingsHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            address: self.address,
            state: Rc::clone(&self.state),
        }
    }
}

impl<S: PersistedSettings> SettingsHandle<S> {
    /// Reserve the block and ids, then subscribe to LOAD, SAVE, CHANGE,
    /// ERASE and REPORT.  The value starts at `S::default()`.
    pub fn attach(
        bus: &mut EventBus,
        layout: &mut LayoutBuilder,
        name: &'static str,
    ) -> Result<Self, RegistryError> {
        let address = layout.register_external_setting(name, S::SIZE)?;
        for descriptor in S::DESCRIPTORS {
            layout.claim_setting_id(descriptor.id)?;
        }

        let handle = Self {
            name,
            address,
            state: Rc::new(RefCell::new(S::default())),
        };

        for kind in [
            EventKind::SettingsLoad,
            EventKind::SettingsSave,
            EventKind::SettingsChange,
            EventKind::SettingsErase,
            EventKind::SettingsReport,
        ] {
            let listener = handle.clone();
            bus.subscribe(
                kind,
                Box::new(move |event: &mut Event<'_>, host: &mut dyn Host| {
                    listener.on_event(event, host)
                }),
            );
        }
        Ok(handle)
    }

    pub fn address(&self) -> BlockAddress {
        self.address
    }

    pub fn borrow(&self) -> Ref<'_, S> {
        self.state.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, S> {
        self.state.borrow_mut()
    }

    /// Read and decode the block.  Undecodable bytes restore defaults and
    /// rewrite the block; only a storage failure is an error.
    pub fn load(&self, nvs: &mut dyn NvsPort) -> Result<(), StorageError> {
        let mut buf = vec![0u8; S::SIZE as usize];
        nvs.read(self.address.get(), &mut buf)?;

        if let Ok(value) = postcard::from_bytes::<S>(&buf) {
            *self.state.borrow_mut() = value;
        } else {
            warn!(
                "Settings: '{}' at {} is unreadable, restoring defaults",
                self.name,
                self.address.get()
            );
            *self.state.borrow_mut() = S::default();
            if let Err(e) = self.save(nvs) {
                warn!("Settings: '{}' default write-back failed: {}", self.name, e);
            }
        }
        Ok(())
    }

    /// Encode the current value into the block.
    pub fn save(&self, nvs: &mut dyn NvsPort) -> Result<(), Error> {
        let mut buf = vec![0u8; S::SIZE as usize];
        postcard::to_slice(&*self.state.borrow(), &mut buf)
            .map_err(|_| Error::Config("settings value exceeds reserved block size"))?;
        nvs.write(self.address.get(), &buf)?;
        Ok(())
    }

    /// Reset the in-memory value to defaults (storage untouched).
    pub fn reset(&self) {
        *self.state.borrow_mut() = S::default();
    }

    fn on_event(&self, event: &mut Event<'_>, host: &mut dyn Host) -> Dispatch {
        match event {
            Event::SettingsLoad(req) => self.on_load(req, host),
            Event::SettingsSave(req) => {
                if req.addresses(self.address) {
                    if let Err(e) = self.save(host.nvs()) {
                        error!("Settings: '{}' save failed: {}", self.name, e);
                        req.write_failures = req.write_failures.saturating_add(1);
                    }
                }
                Dispatch::Continue
            }
            Event::SettingsErase(req) => {
                if req.addresses(self.address) {
                    self.reset();
                }
                Dispatch::Continue
            }
            Event::SettingsChange(req) => self.on_change(req, host),
            Event::SettingsReport(req) => {
                self.on_report(req);
                Dispatch::Continue
            }
            _ => Dispatch::Continue,
        }
    }

    fn on_load(&self, req: &mut BlockRequest, host: &mut dyn Host) -> Dispatch {
        if !req.addresses(self.address) {
            return Dispatch::Continue;
        }
        match self.load(host.nvs()) {
            Ok(()) => Dispatch::Continue,
            Err(e) => {
                error!(
                    "Settings: '{}' read at {} failed: {}",
                    self.name,
                    self.address.get(),
                    e
                );
                req.status = Status::SettingReadFail;
                Dispatch::Handled
            }
        }
    }

    fn on_change(&self, req: &mut ChangeRequest, host: &mut dyn Host) -> Dispatch {
        if !S::DESCRIPTORS.iter().any(|d| d.id == req.id) {
            return Dispatch::Continue;
        }
        req.status = self.state.borrow_mut().apply(req.id, req.value);
        if req.status.is_ok() {
            info!("Settings: ${}={} applied to '{}'", req.id, req.value, self.name);
            if let Err(e) = self.save(host.nvs()) {
                warn!("Settings: '{}' write-back after change failed: {}", self.name, e);
            }
        }
        Dispatch::Handled
    }

    fn on_report(&self, req: &mut ReportRequest) {
        let state = self.state.borrow();
        for descriptor in S::DESCRIPTORS {
            if !req.wants(descriptor.id) {
                continue;
            }
            if let Some(value) = state.value(descriptor.id) {
                req.lines.push(report_line(descriptor.id, value, descriptor.format));
            }
        }
    }
}
