//! Host configuration parameters
//!
//! Storage layout and limits the extension layer needs from its host.
//! Values are fixed at build/boot time; runtime-tunable values live in the
//! extensions' persisted settings blocks instead.

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::settings::registry::LAYOUT_TAG_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    // --- Storage ---
    /// Total NVS capacity in bytes
    pub nvs_size: u16,
    /// Address of the 4-byte layout fingerprint
    pub layout_tag_address: u16,
    /// First byte handed out to extension settings blocks
    pub extension_base: u16,

    // --- Timing ---
    /// Upper bound for any blocking wait inside a listener (milliseconds)
    pub max_blocking_delay_ms: u32,

    // --- Pin I/O ---
    /// First output number owned by the pin I/O extension
    pub pin_io_first_pin: u8,
    /// Number of outputs owned by the pin I/O extension
    pub pin_io_pin_count: u8,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            nvs_size: 2048,
            layout_tag_address: 1020,
            extension_base: 1024,

            max_blocking_delay_ms: 5000,

            pin_io_first_pin: 0,
            pin_io_pin_count: 64,
        }
    }
}

impl HostConfig {
    /// Range-check the configuration.
    pub fn validate(&self) -> Result<(), Error> {
        if self.extension_base >= self.nvs_size {
            return Err(Error::Config("extension_base must lie inside nvs_size"));
        }
        let tag_end = u32::from(self.layout_tag_address) + LAYOUT_TAG_LEN as u32;
        if tag_end > u32::from(self.nvs_size) {
            return Err(Error::Config("layout tag must lie inside nvs_size"));
        }
        if self.layout_tag_address >= self.extension_base
            || tag_end > u32::from(self.extension_base)
        {
            return Err(Error::Config(
                "layout tag must sit below the extension area",
            ));
        }
        if self.pin_io_pin_count == 0 {
            return Err(Error::Config("pin_io_pin_count must be at least 1"));
        }
        if self.max_blocking_delay_ms > 60_000 {
            return Err(Error::Config("max_blocking_delay_ms must be <= 60000"));
        }
        Ok(())
    }
}
