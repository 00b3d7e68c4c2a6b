//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade (serial console on target, stderr in the simulator).

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                blocks,
                footprint,
                restored_defaults,
            } => {
                info!(
                    "START | blocks={} footprint={}B defaults_restored={}",
                    blocks, footprint, restored_defaults
                );
            }
            AppEvent::LineExecuted(claim) => info!("LINE | executed by {}", claim),
            AppEvent::LinePassedThrough => info!("LINE | passed to host"),
            AppEvent::LineRejected(status) => {
                warn!("LINE | rejected: {} (error:{})", status, status.code());
            }
            AppEvent::SettingChanged { id, value } => info!("SETTING | ${}={}", id, value),
            AppEvent::SettingsRestored => info!("SETTING | defaults restored"),
            AppEvent::SettingsLoadFailed(status) => {
                error!("SETTING | load failed: {} (error:{})", status, status.code());
            }
        }
    }
}
