//! Extension settings registry.
//!
//! Extensions reserve fixed-size blocks of persisted storage during init
//! ([`registry::LayoutBuilder`]) and then take part in five lifecycle
//! events published by the host:
//!
//! | Event  | Payload          | Dispatch                                   |
//! |--------|------------------|--------------------------------------------|
//! | LOAD   | [`BlockRequest`] | fan-out; a read failure halts the chain    |
//! | SAVE   | [`BlockRequest`] | fan-out                                    |
//! | ERASE  | [`BlockRequest`] | fan-out (reset in-memory value to default) |
//! | CHANGE | [`ChangeRequest`]| competitive on the numeric setting id      |
//! | REPORT | [`ReportRequest`]| fan-out, one `$<id>=<value>` line each     |
//!
//! [`handle::SettingsHandle`] implements all five for any
//! [`PersistedSettings`] type.

pub mod handle;
pub mod registry;

use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::RegistryError;
use crate::status::Status;

pub use handle::SettingsHandle;
pub use registry::{BlockAddress, LayoutBuilder, SettingsManifest};

// ---------------------------------------------------------------------------
// Setting ids
// ---------------------------------------------------------------------------

/// Numeric id of an extension setting.  Ids below 256 belong to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SettingId(u16);

impl SettingId {
    pub const MIN_EXTENSION: u16 = 256;

    pub const fn new(id: u16) -> Result<Self, RegistryError> {
        if id < Self::MIN_EXTENSION {
            return Err(RegistryError::ReservedSettingId(id));
        }
        Ok(Self(id))
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// How a setting's value is rendered in a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingFormat {
    Integer,
    Decimal,
}

/// Static description of one user-visible setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingDescriptor {
    pub id: u16,
    pub name: &'static str,
    pub format: SettingFormat,
}

/// Render `$<id>=<value>` in the host's canonical report format.
pub fn report_line(id: u16, value: f32, format: SettingFormat) -> String {
    match format {
        SettingFormat::Integer => format!("${}={}", id, value.round() as i64),
        SettingFormat::Decimal => format!("${}={:.3}", id, value),
    }
}

// ---------------------------------------------------------------------------
// Persisted block contract
// ---------------------------------------------------------------------------

/// A settings block owned by one extension.
///
/// The in-memory value is postcard-encoded into exactly [`SIZE`] bytes at
/// the block's reserved address.
///
/// [`SIZE`]: PersistedSettings::SIZE
pub trait PersistedSettings: Serialize + DeserializeOwned + Default + 'static {
    /// Reserved bytes.  Must hold the largest encoding of `Self`.
    const SIZE: u16;

    /// User-visible settings in this block, in report order.
    const DESCRIPTORS: &'static [SettingDescriptor];

    /// Current value of setting `id`, if this block owns it.
    fn value(&self, id: u16) -> Option<f32>;

    /// Apply a live change.  Only called for ids listed in `DESCRIPTORS`.
    fn apply(&mut self, id: u16, value: f32) -> Status;
}

// ---------------------------------------------------------------------------
// Lifecycle payloads
// ---------------------------------------------------------------------------

/// Which blocks a LOAD/SAVE/ERASE addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTarget {
    All,
    Address(u16),
}

/// Payload of LOAD, SAVE and ERASE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRequest {
    pub target: BlockTarget,
    pub status: Status,
    /// Blocks whose write-back failed during SAVE.
    pub write_failures: u8,
}

impl BlockRequest {
    pub fn new(target: BlockTarget) -> Self {
        Self {
            target,
            status: Status::Ok,
            write_failures: 0,
        }
    }

    pub fn all() -> Self {
        Self::new(BlockTarget::All)
    }

    /// Whether the block at `address` should act on this request.
    pub fn addresses(&self, address: BlockAddress) -> bool {
        match self.target {
            BlockTarget::All => true,
            BlockTarget::Address(a) => a == address.get(),
        }
    }
}

/// Payload of CHANGE.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRequest {
    pub id: u16,
    pub value: f32,
    /// Stays `InvalidStatement` unless an owner handles the id.
    pub status: Status,
}

impl ChangeRequest {
    pub fn new(id: u16, value: f32) -> Self {
        Self {
            id,
            value,
            status: Status::InvalidStatement,
        }
    }
}

/// Payload of REPORT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRequest {
    /// Report a single id, or everything when `None`.
    pub filter: Option<u16>,
    pub lines: Vec<String>,
}

impl ReportRequest {
    pub fn wants(&self, id: u16) -> bool {
        self.filter.is_none_or(|f| f == id)
    }
}
