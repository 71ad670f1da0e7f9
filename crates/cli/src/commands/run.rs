//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{default_channels, Recorder, RecorderRunConfig};
use crate::signal::shutdown_signal;

/// Execute the `run` command
pub async fn run_recorder(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ref host) = args.host {
        info!(host = %host, "Overriding collector host from CLI");
        config.network.host = host.clone();
    }
    if let Some(port) = args.port {
        info!(port = %port, "Overriding collector port from CLI");
        config.network.port = port;
    }
    if let Some(sequence) = args.sequence {
        config.session.sequence = sequence;
    }
    if args.no_network {
        info!("Network mirror disabled from CLI");
        config.network.enabled = false;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after overrides")?;

    info!(
        prefix = %config.session.prefix,
        sequence = config.session.sequence,
        network = config.network.enabled,
        endpoint = %config.network.endpoint(),
        threshold_ms = config.window.threshold_ms,
        "Configuration loaded"
    );

    // Initialize Metrics (optional)
    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let channels = if args.channels.is_empty() {
        default_channels()
    } else {
        args.channels.clone()
    };

    let recorder = Recorder::new(RecorderRunConfig {
        recorder: config,
        channels,
        duration: if args.duration_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(args.duration_secs))
        },
    });

    info!("Starting recorder...");

    let stats = recorder
        .run(shutdown_signal())
        .await
        .context("Recording failed")?;

    info!(
        records = stats.summary.total_records,
        windows = stats.summary.windows_opened,
        failures = stats.summary.write_failures + stats.channel_failures(),
        duration_secs = stats.duration.as_secs_f64(),
        rate = format!("{:.2}", stats.rate()),
        "Recording completed"
    );
    stats.print_summary();

    info!("Sensor Recorder finished");
    Ok(())
}
