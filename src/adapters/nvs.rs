//! NVS (Non-Volatile Storage) adapter.
//!
//! Byte-addressed in-memory image implementing [`NvsPort`].  A fresh
//! image reads as erased flash (`0xFF`).  The simulator binary loads and
//! flushes the image to a file so settings survive between runs.

use log::{debug, info};

use crate::app::ports::{NvsPort, StorageError};

/// Value of an erased byte.
pub const ERASED: u8 = 0xFF;

pub struct NvsAdapter {
    image: Vec<u8>,
}

impl NvsAdapter {
    /// Erased image of `size` bytes.
    pub fn new(size: u16) -> Self {
        info!("NvsAdapter: {} byte simulation image", size);
        Self {
            image: vec![ERASED; size as usize],
        }
    }

    /// Adopt an existing image, padded or truncated to `size`.
    pub fn from_image(mut image: Vec<u8>, size: u16) -> Self {
        image.resize(size as usize, ERASED);
        info!("NvsAdapter: restored {} byte image", image.len());
        Self { image }
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    /// Erase the whole image.
    pub fn erase_all(&mut self) {
        self.image.fill(ERASED);
    }

    fn range(&self, address: u16, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = address as usize;
        let end = start.checked_add(len).ok_or(StorageError::OutOfBounds)?;
        if end > self.image.len() {
            return Err(StorageError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl NvsPort for NvsAdapter {
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.image[range]);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        let range = self.range(address, data.len())?;
        self.image[range].copy_from_slice(data);
        debug!("NvsAdapter: wrote {} bytes at {}", data.len(), address);
        Ok(())
    }

    fn size(&self) -> u16 {
        self.image.len() as u16
    }
}
