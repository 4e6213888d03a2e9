//! Latest flags and segments fetched by the poller, shared with evaluating threads.
use std::sync::{Arc, RwLock};

use crate::models::Configuration;

/// Holds the most recent [`Configuration`] snapshot.
///
/// Readers clone the `Arc` and evaluate without holding the lock, so a poll that lands mid-way
/// through an evaluation never changes the flags that evaluation sees.
#[derive(Default)]
pub struct ConfigurationStore {
    snapshot: RwLock<Option<Arc<Configuration>>>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        ConfigurationStore::default()
    }

    /// Current snapshot, or `None` before the first fetch and after [`clear`](Self::clear).
    ///
    /// A poisoned lock reads as empty.
    pub fn snapshot(&self) -> Option<Arc<Configuration>> {
        self.snapshot.read().ok().and_then(|slot| slot.clone())
    }

    /// Replace the snapshot.
    pub fn publish(&self, configuration: Configuration) {
        let configuration = Arc::new(configuration);
        if let Ok(mut slot) = self.snapshot.write() {
            slot.replace(configuration);
        }
    }

    /// Drop the snapshot. Evaluations already holding it are unaffected.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.snapshot.write() {
            slot.take();
        }
    }
}
