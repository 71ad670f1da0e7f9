//! Sink implementations
//!
//! Contains FileSink and NetworkSink.

mod file;
mod network;

pub use self::file::FileSink;
pub use self::network::NetworkSink;
