//! Wire transport of the ordering service.
//!
//! Frames are length-delimited protobuf envelopes over TCP. The inbound
//! surface accepts single transactions and ordered batches, acknowledging
//! receipt (not inclusion). The outbound surface fans a proposal out to a
//! peer set with one independent asynchronous call per destination; per-peer
//! failures are logged by the completion reaper and never retried, downstream
//! peers re-sync through other mechanisms.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use citrine_types::codec::{decode_envelope, encode_envelope, CodecError};
use citrine_types::proto;
use citrine_types::proto::envelope::Msg;
use citrine_types::{Height, PeerAddress, Proposal, Transaction, TxStatus};

use crate::metrics::Metrics;
use crate::queue::TxSink;
use crate::status::StatusBus;
use crate::triggers::TriggerNotifier;

/// Inbound half of the transport: validates and enqueues what the network
/// delivers, then signals the trigger stream.
#[derive(Clone)]
pub struct Inbound {
    sink: TxSink,
    notifier: TriggerNotifier,
    status: StatusBus,
    metrics: Metrics,
}

impl Inbound {
    pub fn new(
        sink: TxSink,
        notifier: TriggerNotifier,
        status: StatusBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            sink,
            notifier,
            status,
            metrics,
        }
    }

    async fn on_transaction(&self, tx: proto::Transaction) {
        let tx = Transaction::from(tx);

        if !self.validate(&tx) {
            return;
        }

        self.enqueue(tx).await;
    }

    async fn on_batch(&self, list: proto::TxList) {
        let txs: Vec<Transaction> = list.transactions.into_iter().map(Into::into).collect();

        // One malformed transaction rejects the whole batch, mirroring the
        // factory's batch validation.
        if !txs.iter().all(|tx| self.validate(tx)) {
            return;
        }

        for tx in txs {
            self.enqueue(tx).await;
        }
    }

    fn validate(&self, tx: &Transaction) -> bool {
        match tx.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!(hash = %tx.hash(), error = %e, "Rejecting malformed transaction");
                self.status.publish(tx.hash(), TxStatus::Rejected);
                self.metrics.add_rejected();
                false
            }
        }
    }

    async fn enqueue(&self, tx: Transaction) {
        let hash = tx.hash();

        if !self.sink.push(tx) {
            warn!(%hash, "Ordering queue is gone, dropping transaction");
            return;
        }

        debug!(%hash, queue_size = self.sink.len(), "Transaction enqueued");
        self.status.publish(hash, TxStatus::Received);
        self.metrics.add_received();
        self.metrics.set_queue_size(self.sink.len());

        self.notifier.arrival().await;
    }
}

/// Running inbound endpoint.
pub struct TransportHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TransportHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the accept loop to exit after its cancellation token fires.
    pub async fn stopped(self) {
        let _ = self.task.await;
    }
}

/// Binds the inbound endpoint and spawns its accept loop.
pub async fn serve(
    listen_addr: SocketAddr,
    inbound: Inbound,
    cancel: CancellationToken,
) -> io::Result<TransportHandle> {
    let listener = TcpListener::bind(listen_addr).await?;
    let local_addr = listener.local_addr()?;

    info!(%local_addr, "Ordering endpoint listening");

    let task = tokio::spawn(accept_loop(listener, inbound, cancel));

    Ok(TransportHandle { local_addr, task })
}

async fn accept_loop(listener: TcpListener, inbound: Inbound, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    let inbound = inbound.clone();
                    let cancel = cancel.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, inbound, cancel).await {
                            debug!(%remote, error = %e, "Connection closed with error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Failed to accept connection"),
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    inbound: Inbound,
    cancel: CancellationToken,
) -> io::Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            frame = framed.next() => frame,
        };

        let Some(frame) = frame else {
            return Ok(());
        };
        let frame = frame?;

        let msg = match decode_envelope(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                // Transport-level error: drop the message and the stream.
                warn!(error = %e, "Dropping malformed inbound frame");
                return Ok(());
            }
        };

        match msg {
            Msg::Transaction(tx) => inbound.on_transaction(tx).await,
            Msg::TxList(list) => inbound.on_batch(list).await,
            Msg::Proposal(_) | Msg::Ack(_) => {
                warn!("Dropping unexpected inbound message");
                continue;
            }
        }

        framed.send(encode_envelope(Msg::Ack(proto::Ack {}))).await?;
    }
}

/// Outbound fan-out of proposals to a peer set.
#[async_trait]
pub trait ProposalPublisher: Send + Sync {
    /// Initiates one delivery per peer and returns without awaiting them.
    async fn publish(&self, proposal: Proposal, peers: Vec<PeerAddress>);
}

struct Delivery {
    peer: PeerAddress,
    height: Height,
    result: io::Result<()>,
}

/// TCP implementation of [`ProposalPublisher`].
///
/// Every delivery runs as its own task and reports into a completion queue
/// owned by a reaper task. Shutdown awaits the reaper after dropping the
/// publisher, so every initiated call is accounted for before the node goes
/// away.
pub struct TcpPublisher {
    completions: mpsc::UnboundedSender<Delivery>,
}

impl TcpPublisher {
    pub fn spawn(metrics: Metrics) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let reaper = tokio::spawn(reap_completions(rx, metrics));

        (Self { completions: tx }, reaper)
    }
}

#[async_trait]
impl ProposalPublisher for TcpPublisher {
    async fn publish(&self, proposal: Proposal, peers: Vec<PeerAddress>) {
        let height = proposal.height;
        let frame = encode_envelope(Msg::Proposal(proposal.into()));

        for peer in peers {
            let frame = frame.clone();
            let completions = self.completions.clone();

            tokio::spawn(async move {
                let result = deliver(&peer, frame).await;

                // The reaper is gone only during shutdown, after which the
                // outcome is of no interest.
                let _ = completions.send(Delivery {
                    peer,
                    height,
                    result,
                });
            });
        }
    }
}

async fn reap_completions(mut rx: mpsc::UnboundedReceiver<Delivery>, metrics: Metrics) {
    while let Some(delivery) = rx.recv().await {
        match delivery.result {
            Ok(()) => {
                debug!(peer = %delivery.peer, height = %delivery.height, "Proposal delivered");
            }
            Err(e) => {
                warn!(
                    peer = %delivery.peer,
                    height = %delivery.height,
                    error = %e,
                    "Failed to deliver proposal"
                );
                metrics.add_publish_failure();
            }
        }
    }
}

async fn deliver(peer: &PeerAddress, frame: Bytes) -> io::Result<()> {
    let stream = TcpStream::connect(peer.as_str()).await?;
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    framed.send(frame).await?;

    match framed.next().await {
        Some(Ok(reply)) => match decode_envelope(&reply) {
            Ok(Msg::Ack(_)) => Ok(()),
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "expected an acknowledgement",
            )),
            Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
        },
        Some(Err(e)) => Err(e),
        None => Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before acknowledgement",
        )),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("connection closed before acknowledgement")]
    ConnectionClosed,

    #[error("unexpected reply to a submission")]
    UnexpectedReply,
}

/// Client side of the inbound surface: submits transactions to a running
/// ordering endpoint and waits for the receipt acknowledgement.
pub struct OrderingClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl OrderingClient {
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
        })
    }

    pub async fn submit_transaction(&mut self, tx: Transaction) -> Result<(), ClientError> {
        self.request(Msg::Transaction(tx.into())).await
    }

    pub async fn submit_batch(&mut self, txs: Vec<Transaction>) -> Result<(), ClientError> {
        let list = proto::TxList {
            transactions: txs.into_iter().map(Into::into).collect(),
        };
        self.request(Msg::TxList(list)).await
    }

    async fn request(&mut self, msg: Msg) -> Result<(), ClientError> {
        self.framed.send(encode_envelope(msg)).await?;

        match self.framed.next().await {
            Some(Ok(reply)) => match decode_envelope(&reply)? {
                Msg::Ack(_) => Ok(()),
                _ => Err(ClientError::UnexpectedReply),
            },
            Some(Err(e)) => Err(e.into()),
            None => Err(ClientError::ConnectionClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::queue::{tx_queue, TxQueue};
    use crate::triggers::{DispatchMode, Trigger, TriggerHandler, TriggerStream};

    struct CountingHandler {
        arrivals: mpsc::UnboundedSender<Trigger>,
    }

    #[async_trait]
    impl TriggerHandler for CountingHandler {
        async fn handle_trigger(&mut self, trigger: Trigger) {
            let _ = self.arrivals.send(trigger);
        }
    }

    async fn start_endpoint() -> (
        SocketAddr,
        TxQueue,
        mpsc::UnboundedReceiver<Trigger>,
        StatusBus,
        TriggerStream,
        CancellationToken,
    ) {
        let (sink, queue) = tx_queue();
        let (arrivals_tx, arrivals_rx) = mpsc::unbounded_channel();
        let triggers = TriggerStream::start(
            CountingHandler {
                arrivals: arrivals_tx,
            },
            Duration::from_secs(3600),
            DispatchMode::Decoupled,
        );
        let status = StatusBus::new();
        let cancel = CancellationToken::new();

        let inbound = Inbound::new(
            sink,
            triggers.notifier(),
            status.clone(),
            Metrics::new(),
        );

        let handle = serve("127.0.0.1:0".parse().unwrap(), inbound, cancel.clone())
            .await
            .unwrap();
        let addr = handle.local_addr();

        // The accept loop outlives the test scope; cancellation tears it
        // down when the token is dropped by the caller.
        tokio::spawn(handle.stopped());

        (addr, queue, arrivals_rx, status, triggers, cancel)
    }

    #[tokio::test]
    async fn submitted_transaction_is_enqueued_and_signalled() {
        let (addr, mut queue, mut arrivals, status, triggers, cancel) = start_endpoint().await;
        let mut statuses = status.subscribe();

        let tx = Transaction::new(&b"transfer 10"[..], &b"sig"[..]);
        let mut client = OrderingClient::connect(addr).await.unwrap();
        client.submit_transaction(tx.clone()).await.unwrap();

        let update = statuses.recv().await.unwrap();
        assert_eq!(update.hash, tx.hash());
        assert_eq!(update.status, TxStatus::Received);

        assert_eq!(arrivals.recv().await, Some(Trigger::Arrival));
        assert_eq!(queue.try_pop(), Some(tx));

        cancel.cancel();
        triggers.shutdown().await;
    }

    #[tokio::test]
    async fn batch_preserves_order_and_signals_each_arrival() {
        let (addr, mut queue, mut arrivals, _status, triggers, cancel) = start_endpoint().await;

        let txs: Vec<Transaction> = (0..3u8)
            .map(|n| Transaction::new(vec![n], &b"sig"[..]))
            .collect();

        let mut client = OrderingClient::connect(addr).await.unwrap();
        client.submit_batch(txs.clone()).await.unwrap();

        for _ in 0..3 {
            assert_eq!(arrivals.recv().await, Some(Trigger::Arrival));
        }
        assert_eq!(queue.drain(10), txs);

        cancel.cancel();
        triggers.shutdown().await;
    }

    #[tokio::test]
    async fn malformed_transaction_is_rejected_not_enqueued() {
        let (addr, mut queue, _arrivals, status, triggers, cancel) = start_endpoint().await;
        let mut statuses = status.subscribe();

        let bad = Transaction::new(Bytes::new(), &b"sig"[..]);
        let mut client = OrderingClient::connect(addr).await.unwrap();

        // Application-level rejection is still acknowledged.
        client.submit_transaction(bad).await.unwrap();

        assert_eq!(statuses.recv().await.unwrap().status, TxStatus::Rejected);
        assert!(queue.try_pop().is_none());

        cancel.cancel();
        triggers.shutdown().await;
    }

    #[tokio::test]
    async fn one_bad_transaction_rejects_the_whole_batch() {
        let (addr, mut queue, _arrivals, _status, triggers, cancel) = start_endpoint().await;

        let good = Transaction::new(&b"good"[..], &b"sig"[..]);
        let bad = Transaction::new(Bytes::new(), &b"sig"[..]);

        let mut client = OrderingClient::connect(addr).await.unwrap();
        client.submit_batch(vec![good, bad]).await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(queue.try_pop().is_none());

        cancel.cancel();
        triggers.shutdown().await;
    }

    #[tokio::test]
    async fn publisher_delivers_to_every_reachable_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = listener.local_addr().unwrap();

        let (delivered_tx, mut delivered_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

            let frame = framed.next().await.unwrap().unwrap();
            if let Msg::Proposal(p) = decode_envelope(&frame).unwrap() {
                delivered_tx.send(Proposal::from(p)).unwrap();
            }

            framed
                .send(encode_envelope(Msg::Ack(proto::Ack {})))
                .await
                .unwrap();
        });

        let metrics = Metrics::new();
        let (publisher, _reaper) = TcpPublisher::spawn(metrics);

        let proposal = Proposal::new(
            Height::new(1),
            123,
            vec![Transaction::new(&b"tx"[..], &b"sig"[..])],
        );
        publisher
            .publish(
                proposal.clone(),
                vec![PeerAddress::new(peer_addr.to_string())],
            )
            .await;

        let received = delivered_rx.recv().await.unwrap();
        assert_eq!(received, proposal);
    }

    #[tokio::test]
    async fn unreachable_peer_is_counted_and_ignored() {
        let metrics = Metrics::new();
        let (publisher, reaper) = TcpPublisher::spawn(metrics.clone());

        let proposal = Proposal::new(
            Height::new(1),
            123,
            vec![Transaction::new(&b"tx"[..], &b"sig"[..])],
        );
        publisher
            .publish(proposal, vec![PeerAddress::new("127.0.0.1:1")])
            .await;

        // Dropping the publisher closes the completion queue; the reaper
        // drains what was initiated and exits.
        drop(publisher);
        reaper.await.unwrap();

        assert_eq!(metrics.publish_failures.get(), 1);
    }
}
