//! Error handling for blepctl

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Peripheral error: {0}")]
    Peripheral(#[from] ble_peripheral::PeripheralError),

    #[error("Timed out after {timeout_ms} ms waiting for {waiting_for}")]
    Timeout { waiting_for: String, timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("Hex decoding error: {0}")]
    HexDecoding(#[from] hex::FromHexError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
