//! Same-time window tracking.

use contracts::WindowConfig;
use tracing::trace;

/// What the merged log must do for an incoming record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// Start a new window at this record's timestamp.
    ///
    /// `closes_previous` is set when a window was already open and must be
    /// terminated first.
    Open { closes_previous: bool },
    /// The record belongs to the currently open window.
    Extend,
}

impl WindowDecision {
    pub fn opens_window(&self) -> bool {
        matches!(self, WindowDecision::Open { .. })
    }
}

/// Groups records from different channels that share a moment in time.
///
/// Only the timestamp that opened the current window is remembered; records
/// within `threshold_ms` of it (or older than it) join that window. State is
/// global across channels.
#[derive(Debug)]
pub struct WindowTracker {
    threshold_ms: i64,
    previous_timestamp: i64,
    open: bool,
    windows_opened: u64,
    records_seen: u64,
}

impl WindowTracker {
    /// Create a tracker with the given window configuration
    pub fn new(config: WindowConfig) -> Self {
        Self {
            threshold_ms: config.threshold_ms,
            previous_timestamp: 0,
            open: false,
            windows_opened: 0,
            records_seen: 0,
        }
    }

    /// Feed one record timestamp and decide where it goes
    pub fn push(&mut self, timestamp_ms: i64) -> WindowDecision {
        self.records_seen += 1;

        let gap = timestamp_ms.saturating_sub(self.previous_timestamp);
        if self.open && gap <= self.threshold_ms {
            return WindowDecision::Extend;
        }

        let closes_previous = self.open;
        self.previous_timestamp = timestamp_ms;
        self.open = true;
        self.windows_opened += 1;

        trace!(
            timestamp_ms,
            gap_ms = gap,
            windows = self.windows_opened,
            "window opened"
        );

        WindowDecision::Open { closes_previous }
    }

    /// Close the trailing window at shutdown
    ///
    /// Returns true if a window was open and an `END` marker is owed.
    pub fn finish(&mut self) -> bool {
        std::mem::replace(&mut self.open, false)
    }

    /// Whether a window is currently open
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Timestamp that opened the current (or last) window
    pub fn previous_timestamp(&self) -> i64 {
        self.previous_timestamp
    }

    pub fn threshold_ms(&self) -> i64 {
        self.threshold_ms
    }

    /// Number of windows opened so far
    pub fn window_count(&self) -> u64 {
        self.windows_opened
    }

    /// Number of records observed so far
    pub fn record_count(&self) -> u64 {
        self.records_seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(threshold_ms: i64) -> WindowTracker {
        WindowTracker::new(WindowConfig { threshold_ms })
    }

    #[test]
    fn test_first_record_opens_window() {
        let mut t = tracker(10);
        assert!(!t.is_open());
        assert_eq!(
            t.push(1_000),
            WindowDecision::Open {
                closes_previous: false
            }
        );
        assert!(t.is_open());
        assert_eq!(t.previous_timestamp(), 1_000);
    }

    #[test]
    fn test_first_record_opens_window_even_near_zero() {
        let mut t = tracker(10);
        assert!(t.push(3).opens_window());
    }

    #[test]
    fn test_gap_within_threshold_extends() {
        // 100 / 105 share a window (gap 5), 130 opens a new one (gap 25)
        let mut t = tracker(10);
        assert!(t.push(100).opens_window());
        assert_eq!(t.push(105), WindowDecision::Extend);
        assert_eq!(
            t.push(130),
            WindowDecision::Open {
                closes_previous: true
            }
        );
        assert_eq!(t.window_count(), 2);
        assert_eq!(t.record_count(), 3);
    }

    #[test]
    fn test_gap_equal_to_threshold_extends() {
        let mut t = tracker(10);
        t.push(100);
        assert_eq!(t.push(110), WindowDecision::Extend);
        assert!(t.push(111).opens_window());
    }

    #[test]
    fn test_extend_does_not_move_anchor() {
        let mut t = tracker(10);
        t.push(100);
        t.push(108);
        assert_eq!(t.previous_timestamp(), 100);
        // 115 is within 10 of 108 but not of the anchor 100
        assert!(t.push(115).opens_window());
    }

    #[test]
    fn test_older_record_stays_in_window() {
        let mut t = tracker(10);
        t.push(1_000);
        assert_eq!(t.push(950), WindowDecision::Extend);
    }

    #[test]
    fn test_zero_threshold_only_groups_identical_timestamps() {
        let mut t = tracker(0);
        t.push(50);
        assert_eq!(t.push(50), WindowDecision::Extend);
        assert!(t.push(51).opens_window());
    }

    #[test]
    fn test_finish_closes_once() {
        let mut t = tracker(10);
        assert!(!t.finish());
        t.push(100);
        assert!(t.finish());
        assert!(!t.finish());
        assert!(!t.is_open());
    }

    #[test]
    fn test_reopen_after_finish_does_not_close_previous() {
        let mut t = tracker(10);
        t.push(100);
        t.finish();
        assert_eq!(
            t.push(102),
            WindowDecision::Open {
                closes_previous: false
            }
        );
    }

    #[test]
    fn test_extreme_timestamps_do_not_overflow() {
        let mut t = tracker(10);
        t.push(i64::MIN);
        assert!(t.push(i64::MAX).opens_window());
    }
}
