//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML)
    #[arg(short, long)]
    pub config: Option<String>,

    /// How long to wait for each adapter answer
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the 21-byte iBeacon payload as hex without touching an adapter
    EncodeIbeacon {
        /// Proximity UUID, dashed or not
        uuid: String,
        #[arg(long, default_value_t = 0)]
        major: u16,
        #[arg(long, default_value_t = 0)]
        minor: u16,
        /// Calibrated RSSI at one metre
        #[arg(long, default_value_t = -59, allow_hyphen_values = true)]
        measured_power: i8,
    },
    /// Advertise a local name and service UUIDs
    Advertise {
        /// Local name
        name: String,
        /// Service UUID to advertise; may be repeated
        #[arg(short = 's', long = "service-uuid")]
        service_uuids: Vec<String>,
    },
    /// Advertise as an iBeacon
    Ibeacon {
        uuid: String,
        #[arg(long, default_value_t = 0)]
        major: u16,
        #[arg(long, default_value_t = 0)]
        minor: u16,
        #[arg(long, default_value_t = -59, allow_hyphen_values = true)]
        measured_power: i8,
    },
    /// Advertise raw EIR data given as hex
    Eir {
        /// Advertising data
        adv_data: String,
        /// Scan response data
        #[arg(long)]
        scan_data: Option<String>,
    },
    /// Initialize the adapter and print what it reports
    Status,
}
