//! Sink registry: one entry per channel, created at most once per session

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use contracts::ChannelId;
use dispatcher::{ChannelMetrics, ChannelMetricsSnapshot};
use tokio::sync::OnceCell;

use crate::error::{IngestionError, Result};

/// What the producer side remembers about a registered channel
///
/// The sinks themselves belong to the dispatch loop.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    /// Value count fixed by the channel's first record
    pub arity: usize,
    pub metrics: Arc<ChannelMetrics>,
}

/// Channel registry with atomic get-or-create
///
/// Each suffix belongs to the first channel that claims it, since the suffix
/// names both the local file and the mirror header. The claim outlives a
/// failed initialiser so the owner can retry.
///
/// The map lock only guards slot lookup and suffix claims. Creation runs
/// inside the channel's own `OnceCell`, so concurrent producers of one
/// channel wait for a single initialiser while other channels proceed. A failed initialiser leaves the
/// slot empty and the next caller retries.
#[derive(Default)]
pub struct SinkRegistry {
    slots: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    channels: HashMap<ChannelId, Arc<OnceCell<ChannelEntry>>>,
    suffixes: HashMap<String, ChannelId>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the channel's suffix and return its slot
    fn slot(&self, channel: &ChannelId) -> Result<Arc<OnceCell<ChannelEntry>>> {
        let mut slots = self.lock();
        let owner = slots
            .suffixes
            .entry(channel.suffix().to_string())
            .or_insert_with(|| channel.clone());
        if *owner != *channel {
            return Err(IngestionError::SuffixConflict {
                channel: channel.to_string(),
                suffix: channel.suffix().to_string(),
                owner: owner.to_string(),
            });
        }
        Ok(Arc::clone(slots.channels.entry(channel.clone()).or_default()))
    }

    /// Return the channel's entry, running `create` if it has none yet
    ///
    /// `create` runs at most once successfully per channel. A channel whose
    /// suffix is owned by another channel gets `SuffixConflict` and `create`
    /// is not run.
    pub async fn get_or_register<F, Fut>(&self, channel: &ChannelId, create: F) -> Result<ChannelEntry>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ChannelEntry>>,
    {
        let slot = self.slot(channel)?;
        slot.get_or_try_init(create).await.cloned()
    }

    /// Entry of an already registered channel
    pub fn get(&self, channel: &ChannelId) -> Option<ChannelEntry> {
        self.lock()
            .channels
            .get(channel)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn is_registered(&self, channel: &ChannelId) -> bool {
        self.get(channel).is_some()
    }

    /// Number of fully registered channels
    pub fn len(&self) -> usize {
        self.lock()
            .channels
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-channel write counters, sorted by channel name
    pub fn metrics(&self) -> Vec<(ChannelId, ChannelMetricsSnapshot)> {
        let mut snapshots: Vec<_> = self
            .lock()
            .channels
            .iter()
            .filter_map(|(channel, slot)| {
                slot.get()
                    .map(|entry| (channel.clone(), entry.metrics.snapshot()))
            })
            .collect();
        snapshots.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        snapshots
    }
}
