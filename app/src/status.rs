//! Broadcast bus for transaction status updates.
//!
//! Publishers never block and never fail: with no subscribers, or with a
//! subscriber that has fallen behind the channel capacity, updates are simply
//! lost. Submitters that care about progress subscribe before submitting.

use tokio::sync::broadcast;

use citrine_types::{TxHash, TxStatus};

const BUS_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    pub hash: TxHash,
    pub status: TxStatus,
}

#[derive(Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusUpdate>,
}

impl StatusBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, hash: TxHash, status: TxStatus) {
        let _ = self.tx.send(StatusUpdate { hash, status });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}
