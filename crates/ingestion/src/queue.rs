//! Intake queue between producers and the dispatch loop

use async_channel::{unbounded, Receiver, Sender, TrySendError};
use dispatcher::DispatchCommand;

use crate::error::{IngestionError, Result};

/// Unbounded MPMC FIFO, consumed by a single dispatch loop
///
/// Closing the queue is the stop signal: the consumer keeps receiving until
/// every command pushed before the close has been drained.
pub struct IntakeQueue {
    tx: Sender<DispatchCommand>,
    rx: Receiver<DispatchCommand>,
}

impl IntakeQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Push without waiting
    ///
    /// On failure the command is handed back so its sinks can be closed.
    pub fn push(&self, command: DispatchCommand) -> std::result::Result<(), DispatchCommand> {
        self.tx.try_send(command).map_err(|e| match e {
            TrySendError::Full(command) | TrySendError::Closed(command) => command,
        })
    }

    /// Push, mapping a closed queue to `SessionClosed`
    pub fn push_or_closed(&self, command: DispatchCommand) -> Result<()> {
        self.push(command).map_err(|_| IngestionError::SessionClosed)
    }

    /// Consumer end for the dispatch loop
    pub fn receiver(&self) -> Receiver<DispatchCommand> {
        self.rx.clone()
    }

    /// Stop accepting commands. Returns false if already closed.
    pub fn close(&self) -> bool {
        self.tx.close()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Commands waiting to be dispatched
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl Default for IntakeQueue {
    fn default() -> Self {
        Self::new()
    }
}
