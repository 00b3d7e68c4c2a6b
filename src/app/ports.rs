//! Port traits: the boundary between the extension layer and its host.
//!
//! ```text
//!   Host firmware ──▶ Port traits ──▶ EventBus listeners (extensions)
//! ```
//!
//! The host owns the main loop, the motion planner and persisted storage.
//! Extensions reach them only through [`Host`], which is handed to every
//! listener at dispatch time.  Nothing in the extension layer keeps a
//! reference to host peripherals between calls.

use embedded_hal::delay::DelayNs;

use crate::error::SensorError;

/// Number of linear axes the motion port reports.
pub const N_AXIS: usize = 3;

// ───────────────────────────────────────────────────────────────
// Host bundle (passed into every dispatch)
// ───────────────────────────────────────────────────────────────

/// Everything a listener may touch while handling an event.
pub trait Host {
    fn nvs(&mut self) -> &mut dyn NvsPort;
    fn motion(&mut self) -> &mut dyn MotionPort;
    /// Bounded, blocking delays only.
    fn delay(&mut self) -> &mut dyn DelayNs;
}

// ───────────────────────────────────────────────────────────────
// Non-volatile storage (byte addressed)
// ───────────────────────────────────────────────────────────────

/// Byte-addressed persisted storage (EEPROM, flash emulation, file).
pub trait NvsPort {
    /// Fill `buf` from `address`.  Fails without partial data on error.
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Write `data` at `address`.
    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError>;

    /// Total capacity in bytes.
    fn size(&self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Motion
// ───────────────────────────────────────────────────────────────

/// Bitmask of axes, bit 0 = X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisMask(pub u8);

impl AxisMask {
    pub const ALL: Self = Self((1 << N_AXIS) - 1);

    pub const fn contains(self, axis: usize) -> bool {
        self.0 & (1 << axis) != 0
    }

    pub const fn with(self, axis: usize) -> Self {
        Self(self.0 | (1 << axis))
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

pub trait MotionPort {
    /// Block until every queued motion has completed.  Used as the
    /// synchronisation barrier for M-codes that must not overlap motion.
    fn buffer_synchronize(&mut self);

    /// Current machine position in millimetres.
    fn machine_position(&self) -> [f32; N_AXIS];

    /// Energise or release stepper drivers for the axes in `axes`.
    fn set_steppers_enabled(&mut self, axes: AxisMask, enabled: bool);
}

// ───────────────────────────────────────────────────────────────
// Analog input
// ───────────────────────────────────────────────────────────────

/// Scaled arc-voltage reading for the plasma height controller.
pub trait ArcVoltagePort {
    fn read_volts(&mut self) -> Result<f32, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (extension layer → logging / console)
// ───────────────────────────────────────────────────────────────

/// The service emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`NvsPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Address range lies outside the device.
    OutOfBounds,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::OutOfBounds => write!(f, "address out of bounds"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
