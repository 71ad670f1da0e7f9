//! Session - the ingestion facade producers call

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ChannelId, LineSink, RecorderConfig, SensorRecord, SessionClock};
use dispatcher::{
    open_channel_sinks, open_merged_log, ChannelMetrics, ChannelMetricsSnapshot, DispatchCommand,
    Dispatcher, DispatcherConfig, FileSink, RecordingSummary,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IngestionError, Result};
use crate::queue::IntakeQueue;
use crate::registry::{ChannelEntry, SinkRegistry};

/// Dispatch loop lifecycle
enum LoopState {
    /// Session started, no record ingested yet
    Pending(FileSink),
    Running(JoinHandle<RecordingSummary>),
    Stopped,
}

/// One recording session
///
/// Shared by reference (typically `Arc<Session>`) between producer tasks.
/// `ingest` may be called concurrently; the dispatch loop is started on the
/// first call and all writers are owned by it.
pub struct Session {
    config: Arc<RecorderConfig>,
    clock: SessionClock,
    queue: IntakeQueue,
    registry: SinkRegistry,
    state: Mutex<LoopState>,
}

impl Session {
    /// Start a session: create the merged log (truncating any previous one)
    ///
    /// The dispatch loop is not started until the first `ingest`.
    #[instrument(
        name = "session_start",
        skip(config),
        fields(prefix = %config.session.prefix, sequence = config.session.sequence)
    )]
    pub fn start(config: RecorderConfig) -> Result<Self> {
        let merged = open_merged_log(&config)
            .map_err(|e| IngestionError::registration(contracts::MERGED_LOG_NAME, e))?;

        info!(dir = %config.session_dir().display(), "Session started");

        Ok(Self {
            config: Arc::new(config),
            clock: SessionClock::start_now(),
            queue: IntakeQueue::new(),
            registry: SinkRegistry::new(),
            state: Mutex::new(LoopState::Pending(merged)),
        })
    }

    /// Replace the session clock (for replaying recorded timestamps)
    pub fn with_clock(mut self, clock: SessionClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Clock used to derive `relative_time_s` for this session
    pub fn clock(&self) -> SessionClock {
        self.clock
    }

    /// Accept one record
    ///
    /// The first record of a channel opens its local file and, if enabled,
    /// connects its network mirror and sends the header, before the record is
    /// enqueued. Registration failures are returned and leave the channel
    /// unregistered, so a later `ingest` retries.
    ///
    /// # Errors
    /// - `InvalidRecord` / `ArityMismatch`: the record is rejected, nothing is enqueued
    /// - `SuffixConflict`: another channel already owns this channel's suffix
    /// - `Storage` / `Connection`: the channel could not be registered
    /// - `SessionClosed`: `shutdown` has been called
    pub async fn ingest(&self, record: SensorRecord) -> Result<()> {
        record.validate().map_err(IngestionError::InvalidRecord)?;

        if self.queue.is_closed() {
            return Err(IngestionError::SessionClosed);
        }
        self.ensure_started()?;

        let entry = self
            .registry
            .get_or_register(&record.channel, || {
                self.register(record.channel.clone(), record.arity())
            })
            .await?;

        if entry.arity != record.arity() {
            return Err(IngestionError::ArityMismatch {
                channel: record.channel.to_string(),
                expected: entry.arity,
                actual: record.arity(),
            });
        }

        let channel = record.channel.clone();
        self.queue
            .push_or_closed(DispatchCommand::Record(record))?;
        observability::record_record_ingested(channel.suffix());
        Ok(())
    }

    #[instrument(name = "session_register_channel", skip(self, channel), fields(channel = %channel))]
    async fn register(&self, channel: ChannelId, arity: usize) -> Result<ChannelEntry> {
        let metrics = Arc::new(ChannelMetrics::new());
        let sinks = open_channel_sinks(&channel, &self.config, Arc::clone(&metrics))
            .await
            .map_err(|e| IngestionError::registration(channel.as_str(), e))?;

        let command = DispatchCommand::Register {
            channel: channel.clone(),
            sinks,
        };
        if let Err(command) = self.queue.push(command) {
            // Shut down while connecting: nobody else will close these
            if let DispatchCommand::Register { mut sinks, .. } = command {
                sinks.close().await;
            }
            return Err(IngestionError::SessionClosed);
        }

        observability::record_channel_registered(channel.suffix());
        info!(arity, "Channel registered");
        Ok(ChannelEntry { arity, metrics })
    }

    /// Spawn the dispatch loop on the first call
    fn ensure_started(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match std::mem::replace(&mut *state, LoopState::Stopped) {
            LoopState::Pending(merged) => {
                let dispatcher = Dispatcher::new(
                    DispatcherConfig::from(self.config.as_ref()),
                    merged,
                    self.queue.receiver(),
                );
                *state = LoopState::Running(dispatcher.spawn());
                debug!("Dispatch loop started");
                Ok(())
            }
            running @ LoopState::Running(_) => {
                *state = running;
                Ok(())
            }
            LoopState::Stopped => Err(IngestionError::SessionClosed),
        }
    }

    /// Stop the session
    ///
    /// Every record accepted before this call is written, the trailing window
    /// is closed and all sinks are closed once. Later calls are no-ops and
    /// return `None`.
    #[instrument(name = "session_shutdown", skip(self))]
    pub async fn shutdown(&self) -> Option<RecordingSummary> {
        self.queue.close();

        let previous = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *state, LoopState::Stopped)
        };

        match previous {
            LoopState::Pending(mut merged) => {
                if let Err(e) = merged.close().await {
                    error!(error = %e, "Failed to close merged log");
                }
                info!("Session shut down before any record");
                Some(RecordingSummary::default())
            }
            LoopState::Running(handle) => match handle.await {
                Ok(summary) => {
                    info!(
                        records = summary.total_records,
                        windows = summary.windows_opened,
                        failures = summary.write_failures,
                        "Session shut down"
                    );
                    Some(summary)
                }
                Err(e) => {
                    error!(error = %e, "Dispatch loop terminated abnormally");
                    None
                }
            },
            LoopState::Stopped => {
                warn!("Session already shut down");
                None
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    /// Per-channel write counters, sorted by channel name
    pub fn metrics(&self) -> Vec<(ChannelId, ChannelMetricsSnapshot)> {
        self.registry.metrics()
    }

    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }

    /// Commands not yet dispatched
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}
