//! Registration phase: address allocation for extension settings blocks.
//!
//! A cursor starts at the extension base and is handed out, then advanced,
//! for each `register_external_setting` call.  Offsets are stable across
//! reboots only while registration order is stable; the finished
//! [`SettingsManifest`] carries a fingerprint of the layout so a reordered
//! build is detected at boot instead of misreading stale bytes.

use std::collections::BTreeSet;

use hmac_sha256::Hash;
use log::{debug, info};

use super::SettingId;
use crate::error::RegistryError;

/// Bumped whenever the fingerprint input format changes.
const LAYOUT_VERSION: u8 = 1;

/// Bytes of the fingerprint persisted at the layout tag address.
pub const LAYOUT_TAG_LEN: usize = 4;

/// Start address of one reserved block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockAddress(u16);

impl BlockAddress {
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub name: &'static str,
    pub address: BlockAddress,
    pub size: u16,
}

/// Mutable allocator used while extensions initialise.
#[derive(Debug)]
pub struct LayoutBuilder {
    base: u16,
    cursor: u16,
    limit: u16,
    blocks: Vec<BlockInfo>,
    ids: BTreeSet<u16>,
}

impl LayoutBuilder {
    /// Allocate from `base` up to (not including) `limit`.
    pub fn new(base: u16, limit: u16) -> Self {
        Self {
            base,
            cursor: base,
            limit,
            blocks: Vec::new(),
            ids: BTreeSet::new(),
        }
    }

    /// Reserve `size` bytes and return the block's start offset.
    pub fn register_external_setting(
        &mut self,
        name: &'static str,
        size: u16,
    ) -> Result<BlockAddress, RegistryError> {
        if size == 0 {
            return Err(RegistryError::EmptyBlock);
        }
        let available = self.limit.saturating_sub(self.cursor);
        if size > available {
            return Err(RegistryError::OutOfSpace {
                requested: size,
                available,
            });
        }

        let address = BlockAddress(self.cursor);
        self.cursor += size;
        self.blocks.push(BlockInfo {
            name,
            address,
            size,
        });
        debug!("Settings: '{}' reserved {} bytes at {}", name, size, address.0);
        Ok(address)
    }

    /// Reserve a globally unique extension setting id.
    pub fn claim_setting_id(&mut self, id: u16) -> Result<SettingId, RegistryError> {
        let id = SettingId::new(id)?;
        if !self.ids.insert(id.get()) {
            return Err(RegistryError::DuplicateSettingId(id.get()));
        }
        Ok(id)
    }

    /// Bytes reserved so far.
    pub fn footprint(&self) -> u16 {
        self.cursor - self.base
    }

    /// Freeze the layout.
    pub fn finish(self) -> SettingsManifest {
        let fingerprint = fingerprint(&self.blocks);
        let manifest = SettingsManifest {
            base: self.base,
            footprint: self.cursor - self.base,
            blocks: self.blocks,
            setting_ids: self.ids.into_iter().collect(),
            fingerprint,
        };
        info!(
            "Settings: layout frozen, {} blocks, {} bytes from {}",
            manifest.blocks.len(),
            manifest.footprint,
            manifest.base
        );
        manifest
    }
}

/// Immutable result of the registration phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsManifest {
    base: u16,
    footprint: u16,
    blocks: Vec<BlockInfo>,
    setting_ids: Vec<u16>,
    fingerprint: [u8; LAYOUT_TAG_LEN],
}

impl SettingsManifest {
    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn footprint(&self) -> u16 {
        self.footprint
    }

    pub fn blocks(&self) -> &[BlockInfo] {
        &self.blocks
    }

    /// Registered setting ids in ascending order.
    pub fn setting_ids(&self) -> &[u16] {
        &self.setting_ids
    }

    pub fn fingerprint(&self) -> [u8; LAYOUT_TAG_LEN] {
        self.fingerprint
    }

    pub fn block_at(&self, address: u16) -> Option<&BlockInfo> {
        self.blocks.iter().find(|b| b.address.get() == address)
    }
}

fn fingerprint(blocks: &[BlockInfo]) -> [u8; LAYOUT_TAG_LEN] {
    let mut hash = Hash::new();
    hash.update([LAYOUT_VERSION]);
    for block in blocks {
        hash.update(block.name.as_bytes());
        hash.update([0]);
        hash.update(block.address.get().to_le_bytes());
        hash.update(block.size.to_le_bytes());
    }
    let digest = hash.finalize();
    let mut tag = [0u8; LAYOUT_TAG_LEN];
    tag.copy_from_slice(&digest[..LAYOUT_TAG_LEN]);
    tag
}
