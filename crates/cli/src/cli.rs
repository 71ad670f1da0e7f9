//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use ingestion::MockSensorConfig;
use std::path::PathBuf;

/// Sensor Recorder - multi-channel sensor logging with a live network mirror
#[derive(Parser, Debug)]
#[command(
    name = "sensor-recorder",
    author,
    version,
    about = "Multi-channel sensor recorder with same-time coalescing",
    long_about = "Records timestamped sensor readings to per-channel files, mirrors them \n\
                  to a remote collector over TCP, and groups readings that share a \n\
                  moment into a merged same-time log."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SENSOR_RECORDER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SENSOR_RECORDER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record a session from mock producers
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Accept mirror connections and store each stream in a file
    Collect(CollectArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "recorder.toml",
        env = "SENSOR_RECORDER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override collector host from configuration
    #[arg(long, env = "SENSOR_RECORDER_HOST")]
    pub host: Option<String>,

    /// Override collector port from configuration
    #[arg(long, env = "SENSOR_RECORDER_PORT")]
    pub port: Option<u16>,

    /// Override the session sequence number
    #[arg(long)]
    pub sequence: Option<u32>,

    /// Disable the network mirror, record locally only
    #[arg(long)]
    pub no_network: bool,

    /// Stop after this many seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "SENSOR_RECORDER_DURATION")]
    pub duration_secs: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SENSOR_RECORDER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Mock channel as name:hz:arity (repeatable)
    #[arg(long = "channel", value_name = "NAME:HZ:ARITY")]
    pub channels: Vec<MockSensorConfig>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "recorder.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `collect` command
#[derive(Parser, Debug, Clone)]
pub struct CollectArgs {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:7220", env = "SENSOR_COLLECTOR_LISTEN")]
    pub listen: String,

    /// Directory receiving one file per mirrored channel
    #[arg(short, long, default_value = "collected", env = "SENSOR_COLLECTOR_OUT")]
    pub out: PathBuf,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
