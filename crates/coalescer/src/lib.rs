//! # Coalescer
//!
//! 同时刻窗口合并（跨通道）。
//!
//! 负责：
//! - 按时间戳间隔划分窗口
//! - 告知调用方何时写 `START` / `END`
//! - 关闭时补齐最后一个窗口
//!
//! 不持有任何 writer，写入由 dispatcher 完成。
//!
//! ## 使用示例
//!
//! ```
//! use coalescer::{WindowConfig, WindowDecision, WindowTracker};
//!
//! let mut tracker = WindowTracker::new(WindowConfig { threshold_ms: 10 });
//!
//! assert!(tracker.push(100).opens_window());
//! assert_eq!(tracker.push(105), WindowDecision::Extend);
//! assert!(tracker.push(130).opens_window());
//! assert!(tracker.finish());
//! ```

mod window;

pub use contracts::WindowConfig;
pub use window::{WindowDecision, WindowTracker};
