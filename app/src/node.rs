//! Node bootstrap: builds the collaborators, wires them together and runs
//! the ordering service.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre;
use prometheus_client::registry::Registry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use citrine_cli::config::{Config, PeersConfig};
use citrine_cli::metrics as metrics_endpoint;

use crate::core::OrderingCore;
use crate::factory::ValidatingFactory;
use crate::metrics::Metrics;
use crate::peers::{PeerDirectory, PeersFile, StaticPeers};
use crate::queue::tx_queue;
use crate::status::StatusBus;
use crate::store::RedbHeightStore;
use crate::transport::{self, Inbound, TcpPublisher, TransportHandle};
use crate::triggers::TriggerStream;

/// The ordering node.
#[derive(Clone)]
pub struct Node {
    pub config: Config,
    pub home_dir: PathBuf,
}

/// Components of a running node.
pub struct NodeHandle {
    pub status: StatusBus,
    local_addr: SocketAddr,
    triggers: TriggerStream,
    transport: TransportHandle,
    publisher_reaper: JoinHandle<()>,
    cancel: CancellationToken,
}

impl NodeHandle {
    /// Address the inbound endpoint actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Graceful teardown: stop inbound dispatch, release the trigger
    /// subscription (an emission already in progress completes first), then
    /// drain the outbound completion reaper.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.transport.stopped().await;
        self.triggers.shutdown().await;
        let _ = self.publisher_reaper.await;
    }
}

impl Node {
    pub fn new(config: Config, home_dir: PathBuf) -> Self {
        Self { config, home_dir }
    }

    /// Builds and starts every component of the node.
    pub async fn start(&self) -> eyre::Result<NodeHandle> {
        let config = &self.config;
        let span = tracing::error_span!("node", moniker = %config.moniker);
        let _enter = span.enter();

        let mut registry = Registry::default();
        let metrics = Metrics::register(&mut registry);

        if config.metrics.enabled {
            tokio::spawn(metrics_endpoint::serve(
                config.metrics.listen_addr,
                Arc::new(registry),
            ));
        }

        std::fs::create_dir_all(&self.home_dir)?;
        let db_file = if config.storage.db_file.is_absolute() {
            config.storage.db_file.clone()
        } else {
            self.home_dir.join(&config.storage.db_file)
        };

        // A store that cannot be opened or read is fatal: emitting without
        // the recorded height could regress the sequence.
        let store = RedbHeightStore::open(db_file).await?;

        let peers = peer_directory(&config.peers);
        let factory = Arc::new(ValidatingFactory::new(config.ordering.max_proposal_txs));
        let status = StatusBus::new();
        let (publisher, publisher_reaper) = TcpPublisher::spawn(metrics.clone());
        let (sink, queue) = tx_queue();

        let core = OrderingCore::new(
            queue,
            config.ordering.max_proposal_txs,
            Arc::new(store),
            peers,
            factory,
            Arc::new(publisher),
            status.clone(),
            metrics.clone(),
        )
        .await?;

        let triggers = TriggerStream::start(
            core,
            config.ordering.deadline_interval,
            config.ordering.dispatch,
        );

        let cancel = CancellationToken::new();
        let inbound = Inbound::new(sink, triggers.notifier(), status.clone(), metrics);
        let transport: TransportHandle =
            transport::serve(config.transport.listen_addr, inbound, cancel.clone()).await?;

        Ok(NodeHandle {
            status,
            local_addr: transport.local_addr(),
            triggers,
            transport,
            publisher_reaper,
            cancel,
        })
    }

    /// Runs the node until interrupted.
    pub async fn run(self) -> eyre::Result<()> {
        let handle = self.start().await?;
        info!(listen_addr = %handle.local_addr(), "Ordering service started");

        tokio::signal::ctrl_c().await?;

        info!("Shutting down");
        handle.shutdown().await;

        Ok(())
    }
}

fn peer_directory(config: &PeersConfig) -> Arc<dyn PeerDirectory> {
    match &config.peers_file {
        Some(path) => Arc::new(PeersFile::new(path.clone())),
        None => Arc::new(StaticPeers::new(config.addresses.clone())),
    }
}
