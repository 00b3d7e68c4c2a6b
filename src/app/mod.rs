//! Application core: the extension host, no direct I/O.
//!
//! Registration, line dispatch and the settings lifecycle are driven from
//! [`service`].  All interaction with the host firmware happens through
//! the **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
