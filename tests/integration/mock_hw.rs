//! Mock host for integration tests.
//!
//! Records every motion, delay and output call so tests can assert on the
//! full history, and lets a test make storage reads fail at a chosen
//! address to exercise the SETTING_READ_FAIL path, or reject every write.

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use cncext::app::events::AppEvent;
use cncext::app::ports::{AxisMask, EventSink, Host, MotionPort, N_AXIS, NvsPort, StorageError};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

// ── Motion call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum MotionCall {
    Synchronize,
    Steppers { axes: AxisMask, enabled: bool },
    DelayNs(u32),
}

// ── Storage ───────────────────────────────────────────────────

pub struct MockNvs {
    pub image: Vec<u8>,
    /// Reads covering this address fail with `IoError`.
    pub fail_reads_at: Option<u16>,
    /// Every write fails with `IoError` and leaves the image untouched.
    pub fail_writes: bool,
    pub writes: usize,
}

impl MockNvs {
    pub fn new(size: u16) -> Self {
        Self {
            image: vec![0xFF; size as usize],
            fail_reads_at: None,
            fail_writes: false,
            writes: 0,
        }
    }
}

impl NvsPort for MockNvs {
    fn read(&self, address: u16, buf: &mut [u8]) -> Result<(), StorageError> {
        let start = address as usize;
        let end = start + buf.len();
        if let Some(bad) = self.fail_reads_at {
            if (start..end).contains(&(bad as usize)) {
                return Err(StorageError::IoError);
            }
        }
        let src = self.image.get(start..end).ok_or(StorageError::OutOfBounds)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, address: u16, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        let start = address as usize;
        let dst = self
            .image
            .get_mut(start..start + data.len())
            .ok_or(StorageError::OutOfBounds)?;
        dst.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }

    fn size(&self) -> u16 {
        self.image.len() as u16
    }
}

// ── Machine ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockMachine {
    pub calls: Vec<MotionCall>,
    pub position: [f32; N_AXIS],
}

impl MotionPort for MockMachine {
    fn buffer_synchronize(&mut self) {
        self.calls.push(MotionCall::Synchronize);
    }

    fn machine_position(&self) -> [f32; N_AXIS] {
        self.position
    }

    fn set_steppers_enabled(&mut self, axes: AxisMask, enabled: bool) {
        self.calls.push(MotionCall::Steppers { axes, enabled });
    }
}

impl DelayNs for MockMachine {
    fn delay_ns(&mut self, ns: u32) {
        self.calls.push(MotionCall::DelayNs(ns));
    }
}

#[allow(dead_code)]
impl MockMachine {
    pub fn synchronizations(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == MotionCall::Synchronize)
            .count()
    }

    pub fn total_delay_ms(&self) -> u64 {
        self.calls
            .iter()
            .filter_map(|c| match c {
                MotionCall::DelayNs(ns) => Some(u64::from(*ns)),
                _ => None,
            })
            .sum::<u64>()
            / 1_000_000
    }
}

// ── Host bundle ───────────────────────────────────────────────

pub struct MockHost {
    pub nvs: MockNvs,
    pub machine: MockMachine,
}

impl MockHost {
    pub fn new(nvs_size: u16) -> Self {
        Self {
            nvs: MockNvs::new(nvs_size),
            machine: MockMachine::default(),
        }
    }
}

impl Host for MockHost {
    fn nvs(&mut self) -> &mut dyn NvsPort {
        &mut self.nvs
    }

    fn motion(&mut self) -> &mut dyn MotionPort {
        &mut self.machine
    }

    fn delay(&mut self) -> &mut dyn DelayNs {
        &mut self.machine
    }
}

// ── Output pin ────────────────────────────────────────────────

/// Output pin recording every level written.
#[derive(Clone, Default)]
pub struct MockPin {
    pub history: Rc<RefCell<Vec<bool>>>,
}

#[allow(dead_code)]
impl MockPin {
    pub fn level(&self) -> bool {
        self.history.borrow().last().copied().unwrap_or(false)
    }

    pub fn writes(&self) -> usize {
        self.history.borrow().len()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.history.borrow_mut().push(true);
        Ok(())
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
