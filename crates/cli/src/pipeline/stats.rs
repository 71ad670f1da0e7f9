//! Recording run statistics.

use std::time::Duration;

use contracts::ChannelId;
use ingestion::{ChannelMetricsSnapshot, RecordingSummary};

/// Statistics from a recording run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Total duration of the run
    pub duration: Duration,

    /// Records accepted by the session
    pub records_sent: u64,

    /// Per-channel write counters
    pub channels: Vec<(ChannelId, ChannelMetricsSnapshot)>,

    /// Dispatch loop summary
    pub summary: RecordingSummary,
}

impl RunStats {
    /// Records written per second
    pub fn rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.summary.total_records as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Failed writes across every channel sink
    pub fn channel_failures(&self) -> u64 {
        self.channels
            .iter()
            .map(|(_, snapshot)| snapshot.total_failures())
            .sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Recording Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Records accepted: {}", self.records_sent);
        println!("   ├─ Records written: {}", self.summary.total_records);
        println!("   ├─ Rate: {:.2}/s", self.rate());
        println!("   ├─ Windows: {}", self.summary.windows_opened);
        println!("   ├─ Records per window: {}", self.summary.window_records);
        println!("   └─ Write failures: {}", self.summary.write_failures);

        if !self.channels.is_empty() {
            println!("\nChannels");
            let last = self.channels.len() - 1;
            for (i, (channel, snapshot)) in self.channels.iter().enumerate() {
                let branch = if i == last { "└─" } else { "├─" };
                println!(
                    "   {} {}: local {}/{} failed, network {}/{} failed",
                    branch,
                    channel,
                    snapshot.local.failure_count,
                    snapshot.local.write_count + snapshot.local.failure_count,
                    snapshot.network.failure_count,
                    snapshot.network.write_count + snapshot.network.failure_count,
                );
            }
        }

        println!();
    }
}
