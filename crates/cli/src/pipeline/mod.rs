//! Recording orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{default_channels, Recorder, RecorderRunConfig};
pub use stats::RunStats;
