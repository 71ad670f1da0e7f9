//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{RecorderConfig, RetryPolicy};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    prefix: String,
    sequence: u32,
    session_dir: String,
    threshold_ms: i64,
    network_enabled: bool,
    endpoint: String,
    connect_attempts: u32,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    prefix: config.session.prefix.clone(),
                    sequence: config.session.sequence,
                    session_dir: config.session_dir().display().to_string(),
                    threshold_ms: config.window.threshold_ms,
                    network_enabled: config.network.enabled,
                    endpoint: config.network.endpoint(),
                    connect_attempts: config.network.attempts(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RecorderConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !config.network.enabled {
        warnings.push("network.enabled is false - records are stored locally only".to_string());
    }

    if config.network.enabled && config.network.retry_policy == RetryPolicy::None {
        warnings.push(
            "network.retry_policy is none - a collector that is not up yet fails registration"
                .to_string(),
        );
    }

    if config.window.threshold_ms == 0 {
        warnings.push(
            "window.threshold_ms is 0 - only identical timestamps share a window".to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Session: {} (#{})", summary.prefix, summary.sequence);
            println!("  Directory: {}", summary.session_dir);
            println!("  Window threshold: {}ms", summary.threshold_ms);
            if summary.network_enabled {
                println!(
                    "  Collector: {} ({} attempt(s))",
                    summary.endpoint, summary.connect_attempts
                );
            } else {
                println!("  Collector: disabled");
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
