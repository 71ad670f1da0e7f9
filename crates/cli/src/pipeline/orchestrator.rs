//! Recorder orchestrator - drives one session from mock producers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::RecorderConfig;
use ingestion::{MockSensorConfig, MockSensorSource, Session};
use tracing::{info, warn};

use super::RunStats;

/// Channels recorded when none are given on the command line
pub fn default_channels() -> Vec<MockSensorConfig> {
    vec![
        MockSensorConfig {
            channel: "android.sensor.accelerometer".to_string(),
            frequency_hz: 50.0,
            arity: 3,
        },
        MockSensorConfig {
            channel: "android.sensor.gyroscope".to_string(),
            frequency_hz: 50.0,
            arity: 3,
        },
        MockSensorConfig {
            channel: "android.sensor.light".to_string(),
            frequency_hz: 5.0,
            arity: 1,
        },
    ]
}

/// Recorder configuration
#[derive(Debug, Clone)]
pub struct RecorderRunConfig {
    /// Validated session configuration
    pub recorder: RecorderConfig,

    /// Producers to run, one task each
    pub channels: Vec<MockSensorConfig>,

    /// Stop after this long (None = until `stop` resolves)
    pub duration: Option<Duration>,
}

/// Main recorder orchestrator
pub struct Recorder {
    config: RecorderRunConfig,
}

impl Recorder {
    pub fn new(config: RecorderRunConfig) -> Self {
        Self { config }
    }

    /// Run the session until the duration elapses or `stop` resolves
    pub async fn run<F>(self, stop: F) -> Result<RunStats>
    where
        F: std::future::Future<Output = ()>,
    {
        let start_time = Instant::now();
        let session = Arc::new(
            Session::start(self.config.recorder.clone()).context("Failed to start session")?,
        );

        let sources: Vec<MockSensorSource> = self
            .config
            .channels
            .iter()
            .cloned()
            .map(MockSensorSource::new)
            .collect();
        let handles: Vec<_> = sources
            .iter()
            .map(|source| source.start(Arc::clone(&session)))
            .collect();

        info!(
            channels = sources.len(),
            dir = %self.config.recorder.session_dir().display(),
            "Recording started"
        );

        let timeout = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = timeout => info!("Recording duration elapsed"),
            _ = stop => warn!("Received shutdown signal, stopping recording..."),
        }

        for source in &sources {
            source.stop();
        }

        let mut records_sent = 0;
        for (source, handle) in sources.iter().zip(handles) {
            match handle.await {
                Ok(sent) => records_sent += sent,
                Err(e) => warn!(channel = %source.config().channel, error = %e, "Producer task failed"),
            }
        }

        let summary = session.shutdown().await.unwrap_or_default();

        Ok(RunStats {
            duration: start_time.elapsed(),
            records_sent,
            channels: session.metrics(),
            summary,
        })
    }
}
