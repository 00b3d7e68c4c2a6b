//! CNC firmware extension library.
//!
//! An ordered event bus with a claim-then-execute protocol for custom
//! G/M-codes, a registry of persisted settings blocks with a
//! load/save/change/erase/report lifecycle, a PID loop, and a set of
//! example extensions built on them.  The host firmware owns the main
//! loop, the motion planner and storage; it reaches this crate through
//! [`app::service::ExtensionHost`] and lends its peripherals through the
//! traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod plugins;
pub mod scheduler;
pub mod settings;
pub mod status;
