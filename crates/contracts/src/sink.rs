//! LineSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for text sinks.

use crate::ContractError;

/// Line-oriented output trait
///
/// Every sink accepts already formatted, newline-terminated text. Implementations
/// flush after each write; the dispatcher relies on that for durability.
#[trait_variant::make(LineSink: Send)]
pub trait LocalLineSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one formatted line and flush it
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write_line(&mut self, line: &str) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    ///
    /// Closing twice is a no-op.
    async fn close(&mut self) -> Result<(), ContractError>;
}
