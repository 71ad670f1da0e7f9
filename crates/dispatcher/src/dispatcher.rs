//! Dispatcher - single consumer that owns every writer
//!
//! Commands arrive in FIFO order on the intake queue. A channel's `Register`
//! command is always enqueued ahead of its first record, so by the time a
//! record is dispatched its sinks are in place.

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use coalescer::{WindowDecision, WindowTracker};
use contracts::{
    ChannelId, LineSink, RecorderConfig, SensorRecord, TimeZoneMode, WindowConfig, MERGED_LOG_NAME,
};
use observability::{RecordingAggregator, RecordingSummary};

use crate::error::DispatcherError;
use crate::format::LineFormatter;
use crate::metrics::{ChannelMetrics, SinkKind};
use crate::sinks::{FileSink, NetworkSink};

/// Unit of work on the intake queue
pub enum DispatchCommand {
    /// Hand a freshly opened channel's sinks to the dispatcher
    Register {
        channel: ChannelId,
        sinks: ChannelSinks,
    },
    /// A record to fan out
    Record(SensorRecord),
}

/// The writers belonging to one channel
pub struct ChannelSinks {
    pub local: FileSink,
    pub network: Option<NetworkSink>,
    pub metrics: Arc<ChannelMetrics>,
}

impl ChannelSinks {
    pub fn new(local: FileSink, network: Option<NetworkSink>, metrics: Arc<ChannelMetrics>) -> Self {
        Self {
            local,
            network,
            metrics,
        }
    }

    /// Close both sinks, logging failures
    pub async fn close(&mut self) {
        if let Err(e) = self.local.close().await {
            error!(sink = %self.local.name(), error = %e, "Failed to close local sink");
        }
        if let Some(network) = self.network.as_mut() {
            if let Err(e) = network.close().await {
                error!(sink = %network.name(), error = %e, "Failed to close network sink");
            }
        }
    }
}

/// Create the merged same-time log for a session (truncating it)
#[instrument(name = "dispatcher_open_merged_log", skip(config))]
pub fn open_merged_log(config: &RecorderConfig) -> Result<FileSink, DispatcherError> {
    let path = config.merged_log_path();
    FileSink::create(MERGED_LOG_NAME, &path)
        .map_err(|e| DispatcherError::sink_creation(MERGED_LOG_NAME, format!("{}: {e}", path.display())))
}

/// Open the local file and, when enabled, the network mirror for a channel
///
/// The network header is sent before returning, so the caller only ever sees
/// fully initialised sinks. Any failure closes what was already opened.
#[instrument(
    name = "dispatcher_open_channel_sinks",
    skip(channel, config, metrics),
    fields(channel = %channel)
)]
pub async fn open_channel_sinks(
    channel: &ChannelId,
    config: &RecorderConfig,
    metrics: Arc<ChannelMetrics>,
) -> Result<ChannelSinks, DispatcherError> {
    let suffix = channel.suffix();
    let path = config.channel_log_path(suffix);
    let mut local = FileSink::create(suffix, &path)
        .map_err(|e| DispatcherError::sink_creation(suffix, format!("{}: {e}", path.display())))?;

    let network = if config.network.enabled {
        match connect_with_header(channel, config).await {
            Ok(sink) => Some(sink),
            Err(e) => {
                let _ = local.close().await;
                return Err(e);
            }
        }
    } else {
        None
    };

    debug!(path = %path.display(), network = network.is_some(), "Channel sinks opened");
    Ok(ChannelSinks::new(local, network, metrics))
}

async fn connect_with_header(
    channel: &ChannelId,
    config: &RecorderConfig,
) -> Result<NetworkSink, DispatcherError> {
    let suffix = channel.suffix();
    let mut sink = NetworkSink::connect(suffix, &config.network).await?;
    if let Err(e) = sink.send_header(&config.network_header(suffix)).await {
        let _ = sink.close().await;
        return Err(e.into());
    }
    Ok(sink)
}

/// Dispatcher configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct DispatcherConfig {
    pub window: WindowConfig,
    pub timezone: TimeZoneMode,
}

impl From<&RecorderConfig> for DispatcherConfig {
    fn from(config: &RecorderConfig) -> Self {
        Self {
            window: config.window,
            timezone: config.format.timezone,
        }
    }
}

/// The dispatch loop: per-channel fan-out plus merged-log coalescing
pub struct Dispatcher {
    input_rx: Receiver<DispatchCommand>,
    merged: FileSink,
    channels: HashMap<ChannelId, ChannelSinks>,
    tracker: WindowTracker,
    formatter: LineFormatter,
    aggregator: RecordingAggregator,
}

impl Dispatcher {
    pub fn new(
        config: DispatcherConfig,
        merged: FileSink,
        input_rx: Receiver<DispatchCommand>,
    ) -> Self {
        Self {
            input_rx,
            merged,
            channels: HashMap::new(),
            tracker: WindowTracker::new(config.window),
            formatter: LineFormatter::new(config.timezone),
            aggregator: RecordingAggregator::new(),
        }
    }

    /// Run the dispatcher main loop
    ///
    /// Returns once the intake queue is closed and drained. Every sink is
    /// closed exactly once before returning.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> RecordingSummary {
        info!(merged = %self.merged.path().display(), "Dispatcher started");

        let mut record_count: u64 = 0;

        while let Ok(command) = self.input_rx.recv().await {
            match command {
                DispatchCommand::Register { channel, sinks } => {
                    self.register(channel, sinks).await;
                }
                DispatchCommand::Record(record) => {
                    record_count += 1;
                    self.dispatch_record(&record).await;

                    if record_count.is_multiple_of(100) {
                        debug!(records = record_count, "Dispatcher progress");
                    }
                }
            }
            observability::record_queue_depth(self.input_rx.len());
        }

        info!(
            records = record_count,
            "Dispatcher input closed, shutting down"
        );

        self.finish().await;

        info!("Dispatcher shutdown complete");
        self.aggregator.summary()
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<RecordingSummary> {
        tokio::spawn(self.run())
    }

    async fn register(&mut self, channel: ChannelId, mut sinks: ChannelSinks) {
        if self.channels.contains_key(&channel) {
            warn!(channel = %channel, "Channel registered twice, closing duplicate sinks");
            sinks.close().await;
            return;
        }
        debug!(channel = %channel, "Channel registered with dispatcher");
        self.channels.insert(channel, sinks);
    }

    async fn dispatch_record(&mut self, record: &SensorRecord) {
        let suffix = record.channel.suffix();

        match self.channels.get_mut(&record.channel) {
            Some(sinks) => {
                let line = self.formatter.local_line(record);
                let ok = write_to(&mut sinks.local, &line, suffix, SinkKind::Local).await;
                sinks.metrics.local.record(ok);
                if !ok {
                    self.aggregator.record_failure();
                }

                if let Some(network) = sinks.network.as_mut() {
                    let line = self.formatter.network_line(record);
                    let ok = write_to(network, &line, suffix, SinkKind::Network).await;
                    sinks.metrics.network.record(ok);
                    if !ok {
                        self.aggregator.record_failure();
                    }
                }
            }
            None => {
                warn!(channel = %record.channel, "Record for unregistered channel, skipping per-channel sinks");
            }
        }

        self.coalesce(record).await;
    }

    async fn coalesce(&mut self, record: &SensorRecord) {
        let decision = self.tracker.push(record.timestamp_ms);

        if let WindowDecision::Open { closes_previous } = decision {
            if closes_previous {
                let end = self.formatter.window_end();
                self.write_merged(&end).await;
            }
            let start = self.formatter.window_start(record.timestamp_ms);
            self.write_merged(&start).await;
            observability::record_window_opened();
        }

        let line = self.formatter.merged_line(record);
        self.write_merged(&line).await;
        self.aggregator
            .record(record.channel.suffix(), decision.opens_window());
    }

    async fn write_merged(&mut self, line: &str) {
        let ok = write_to(&mut self.merged, line, MERGED_LOG_NAME, SinkKind::Merged).await;
        if !ok {
            self.aggregator.record_failure();
        }
    }

    async fn finish(&mut self) {
        if self.tracker.finish() {
            let end = self.formatter.window_end();
            self.write_merged(&end).await;
        }
        self.aggregator.close_window();

        for (channel, sinks) in self.channels.iter_mut() {
            debug!(channel = %channel, "Closing channel sinks");
            sinks.close().await;
        }

        if let Err(e) = self.merged.close().await {
            error!(error = %e, "Failed to close merged log");
        }
    }
}

/// Write one line, logging and counting the outcome
///
/// Failures never stop the loop.
async fn write_to<S: LineSink>(sink: &mut S, line: &str, channel: &str, kind: SinkKind) -> bool {
    let result = sink.write_line(line).await;
    let ok = result.is_ok();
    if let Err(e) = result {
        error!(sink = %sink.name(), kind = %kind, error = %e, "Sink write failed");
    }
    observability::record_sink_write(channel, kind.as_str(), ok);
    ok
}
