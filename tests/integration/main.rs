//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one subsystem through
//! the extension host against mock adapters.  No hardware required.

mod command_protocol_tests;
mod mock_hw;
mod plasma_tests;
mod settings_tests;
