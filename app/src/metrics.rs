use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug)]
pub struct Metrics(Arc<Inner>);

impl Deref for Metrics {
    type Target = Inner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub struct Inner {
    /// Transactions accepted and enqueued
    pub txs_received: Counter,

    /// Transactions rejected at the transport boundary
    pub txs_rejected: Counter,

    /// Proposals published to the peer set
    pub proposals_published: Counter,

    /// Emission cycles aborted because the height could not be persisted
    pub persistence_failures: Counter,

    /// Per-peer deliveries that failed
    pub publish_failures: Counter,

    /// Approximate number of pending transactions
    pub queue_size: Gauge,

    /// Transactions per published proposal
    pub proposal_txs: Histogram,

    /// Time taken by one emission cycle (seconds)
    pub emission_time: Histogram,
}

impl Inner {
    pub fn new() -> Self {
        Self {
            txs_received: Counter::default(),
            txs_rejected: Counter::default(),
            proposals_published: Counter::default(),
            persistence_failures: Counter::default(),
            publish_failures: Counter::default(),
            queue_size: Gauge::default(),
            proposal_txs: Histogram::new(exponential_buckets(1.0, 2.0, 10)),
            emission_time: Histogram::new(exponential_buckets(0.001, 2.0, 10)), // Start from 1ms
        }
    }
}

impl Default for Inner {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self(Arc::new(Inner::new()))
    }

    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::new();

        let registry = registry.sub_registry_with_prefix("ordering");

        registry.register(
            "txs_received",
            "Transactions accepted and enqueued",
            metrics.txs_received.clone(),
        );

        registry.register(
            "txs_rejected",
            "Transactions rejected at the transport boundary",
            metrics.txs_rejected.clone(),
        );

        registry.register(
            "proposals_published",
            "Proposals published to the peer set",
            metrics.proposals_published.clone(),
        );

        registry.register(
            "persistence_failures",
            "Emission cycles aborted because the height could not be persisted",
            metrics.persistence_failures.clone(),
        );

        registry.register(
            "publish_failures",
            "Per-peer deliveries that failed",
            metrics.publish_failures.clone(),
        );

        registry.register(
            "queue_size",
            "Approximate number of pending transactions",
            metrics.queue_size.clone(),
        );

        registry.register(
            "proposal_txs",
            "Transactions per published proposal",
            metrics.proposal_txs.clone(),
        );

        registry.register(
            "emission_time",
            "Time taken by one emission cycle (seconds)",
            metrics.emission_time.clone(),
        );

        metrics
    }

    pub fn add_received(&self) {
        self.txs_received.inc();
    }

    pub fn add_rejected(&self) {
        self.txs_rejected.inc();
    }

    pub fn add_published(&self, tx_count: usize) {
        self.proposals_published.inc();
        self.proposal_txs.observe(tx_count as f64);
    }

    pub fn add_persistence_failure(&self) {
        self.persistence_failures.inc();
    }

    pub fn add_publish_failure(&self) {
        self.publish_failures.inc();
    }

    pub fn set_queue_size(&self, size: usize) {
        self.queue_size.set(size as i64);
    }

    pub fn observe_emission_time(&self, duration: Duration) {
        self.emission_time.observe(duration.as_secs_f64());
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
