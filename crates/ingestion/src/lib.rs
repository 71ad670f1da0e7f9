//! # Ingestion
//!
//! Sensor record ingestion facade.
//!
//! Responsibilities:
//! - Accept records from any number of concurrent producers
//! - Register each channel once (local file + network mirror)
//! - Enqueue records onto the intake queue, FIFO
//! - Lazily start the dispatch loop and drain it on shutdown
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::Session;
//! use contracts::{RecorderConfig, SensorRecord};
//!
//! let session = Session::start(RecorderConfig::with_prefix("walk"))?;
//! session
//!     .ingest(SensorRecord::new("android.sensor.accelerometer", ts, vec![0.1, 9.8, 0.0]))
//!     .await?;
//! session.shutdown().await;
//! ```
//!
//! ## Mock Testing
//!
//! ```ignore
//! use ingestion::MockSensorSource;
//!
//! let source = MockSensorSource::imu("mock.accelerometer", 50.0);
//! let handle = source.start(session.clone());
//! ```

mod error;
mod mock;
mod queue;
mod registry;
mod session;

// Re-exports
pub use contracts::SensorRecord;
pub use dispatcher::{ChannelMetricsSnapshot, MetricsSnapshot, RecordingSummary};
pub use error::{IngestionError, Result};
pub use mock::{MockSensorConfig, MockSensorSource};
pub use queue::IntakeQueue;
pub use registry::{ChannelEntry, SinkRegistry};
pub use session::Session;
