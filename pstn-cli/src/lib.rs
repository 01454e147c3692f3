//! Support library for the `pstn` CLI binary.
//!
//! Re-exports the CLI, configuration, driver and logging modules so
//! doctests and integration tests can exercise the batch runner without
//! forking a subprocess.

pub mod cli;
pub mod config;
pub mod driver;
pub mod logging;
