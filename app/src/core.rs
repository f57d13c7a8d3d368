//! The ordering state machine.
//!
//! A single-consumer reactor over the trigger stream. On every trigger it
//! evaluates the emission guard and, when the guard passes, runs one emission
//! cycle: drain the queue, build a proposal, persist the new height, publish
//! to the current peer snapshot. The trigger stream serializes calls into the
//! handler, so no two emissions ever run concurrently; producers keep
//! enqueueing throughout and are observed on the next cycle.

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use citrine_types::{Height, TxHash, TxStatus};

use crate::factory::ProposalFactory;
use crate::metrics::Metrics;
use crate::peers::PeerDirectory;
use crate::queue::TxQueue;
use crate::status::StatusBus;
use crate::store::{HeightStore, StoreError};
use crate::transport::ProposalPublisher;
use crate::triggers::{Trigger, TriggerHandler};

pub struct OrderingCore {
    queue: TxQueue,
    height: Height,
    max_proposal_txs: usize,
    store: Arc<dyn HeightStore>,
    peers: Arc<dyn PeerDirectory>,
    factory: Arc<dyn ProposalFactory>,
    publisher: Arc<dyn ProposalPublisher>,
    status: StatusBus,
    metrics: Metrics,
}

impl OrderingCore {
    /// Restores the last emitted height and builds the state machine.
    ///
    /// Failure to read the height is fatal and aborts initialization:
    /// emitting without it could regress the height sequence.
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        queue: TxQueue,
        max_proposal_txs: usize,
        store: Arc<dyn HeightStore>,
        peers: Arc<dyn PeerDirectory>,
        factory: Arc<dyn ProposalFactory>,
        publisher: Arc<dyn ProposalPublisher>,
        status: StatusBus,
        metrics: Metrics,
    ) -> Result<Self, StoreError> {
        let height = store.load().await?;
        info!(%height, "Restored last proposal height");

        Ok(Self {
            queue,
            height,
            max_proposal_txs,
            store,
            peers,
            factory,
            publisher,
            status,
            metrics,
        })
    }

    pub fn height(&self) -> Height {
        self.height
    }

    fn should_emit(&self, trigger: Trigger) -> bool {
        match trigger {
            // A deadline flushes whatever has accumulated.
            Trigger::Deadline => !self.queue.is_empty(),
            // An arrival only matters once a full proposal is waiting.
            Trigger::Arrival => self.queue.len() >= self.max_proposal_txs,
        }
    }

    /// One emission cycle: drain, build, persist, publish.
    async fn emit(&mut self) {
        let started = Instant::now();

        let txs = self.queue.drain(self.max_proposal_txs);
        if txs.is_empty() {
            return;
        }
        self.metrics.set_queue_size(self.queue.len());

        let hashes: Vec<TxHash> = txs.iter().map(|tx| tx.hash()).collect();

        let next_height = self.height.increment();
        let created_at = wall_clock_ms();

        debug!(height = %next_height, tx_count = txs.len(), "Starting proposal generation");

        let proposal = match self.factory.create(next_height, created_at, txs) {
            Ok(proposal) => proposal,
            Err(e) => {
                warn!(error = %e, "Failed to build proposal, discarding drained transactions");
                self.drop_batch(&hashes);
                return;
            }
        };

        if let Err(e) = self.store.save(next_height).await {
            warn!(
                height = %next_height,
                error = %e,
                "Proposal height cannot be saved, skipping proposal publish"
            );
            self.metrics.add_persistence_failure();
            self.drop_batch(&hashes);
            return;
        }

        // The height is durable from here on; whatever happens to the
        // publication below, the next cycle starts above it.
        self.height = next_height;

        match self.peers.peers().await {
            Some(peers) if !peers.is_empty() => {
                info!(
                    height = %next_height,
                    tx_count = proposal.tx_count(),
                    peers = peers.len(),
                    "Publishing proposal"
                );
                self.metrics.add_published(proposal.tx_count());
                self.publisher.publish(proposal, peers).await;

                for hash in &hashes {
                    self.status.publish(*hash, TxStatus::InProposal(next_height));
                }
            }
            _ => {
                error!(height = %next_height, "Cannot get the ledger peer list, skipping proposal publish");
                self.drop_batch(&hashes);
            }
        }

        self.metrics.observe_emission_time(started.elapsed());
    }

    fn drop_batch(&self, hashes: &[TxHash]) {
        for hash in hashes {
            self.status.publish(*hash, TxStatus::Dropped);
        }
    }
}

#[async_trait]
impl TriggerHandler for OrderingCore {
    async fn handle_trigger(&mut self, trigger: Trigger) {
        if self.should_emit(trigger) {
            self.emit().await;
        }
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
