//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Record timestamps are epoch milliseconds (`i64`), monotonic per channel only
//! - `relative_time_s` is seconds since session start, used by the network mirror

mod channel_id;
mod config;
mod error;
mod record;
mod sink;

pub use channel_id::ChannelId;
pub use config::*;
pub use error::*;
pub use record::{SensorRecord, SessionClock};
pub use sink::*;
