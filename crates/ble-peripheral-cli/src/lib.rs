//! BLE peripheral CLI library
//!
//! Argument parsing, configuration loading and command handlers for
//! `blepctl`, which drives a [`ble_peripheral::PeripheralController`] on top
//! of the simulated adapter.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::CliAppConfig;
pub use error::{CliError, Result};
