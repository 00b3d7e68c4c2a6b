//! Outbound application events.
//!
//! The [`ExtensionHost`](super::service::ExtensionHost) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters
//! decide what to do with them: log to serial, echo on a console, etc.

use crate::command::Claim;
use crate::status::Status;

#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Settings are loaded and the extensions are live.
    Started {
        blocks: usize,
        footprint: u16,
        restored_defaults: bool,
    },

    /// An extension owned and executed a line.
    LineExecuted(Claim),

    /// No extension claimed the line; the host's built-ins own it.
    LinePassedThrough,

    /// A line was rejected.
    LineRejected(Status),

    /// A setting was changed live.
    SettingChanged { id: u16, value: f32 },

    /// Every block was reset to defaults and written back.
    SettingsRestored,

    /// Boot-time settings load failed; storage is treated as corrupt.
    SettingsLoadFailed(Status),
}
