//! End-to-end scenarios for the ordering service.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use citrine_app::core::OrderingCore;
use citrine_app::factory::ValidatingFactory;
use citrine_app::metrics::Metrics;
use citrine_app::node::Node;
use citrine_app::peers::StaticPeers;
use citrine_app::queue::tx_queue;
use citrine_app::status::StatusBus;
use citrine_app::store::RedbHeightStore;
use citrine_app::transport::{OrderingClient, ProposalPublisher};
use citrine_app::triggers::{DispatchMode, TriggerStream};
use citrine_cli::config::Config;
use citrine_types::codec::{decode_envelope, encode_envelope};
use citrine_types::proto;
use citrine_types::proto::envelope::Msg;
use citrine_types::{Height, PeerAddress, Proposal, Transaction};

/// A ledger peer double: accepts connections, collects delivered proposals
/// and acknowledges each one.
async fn spawn_peer() -> (PeerAddress, mpsc::UnboundedReceiver<Proposal>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = PeerAddress::new(listener.local_addr().unwrap().to_string());
    let (delivered_tx, delivered_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };

            let delivered_tx = delivered_tx.clone();
            tokio::spawn(async move {
                let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

                while let Some(Ok(frame)) = framed.next().await {
                    if let Ok(Msg::Proposal(p)) = decode_envelope(&frame) {
                        let _ = delivered_tx.send(Proposal::from(p));
                    }

                    if framed
                        .send(encode_envelope(Msg::Ack(proto::Ack {})))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
    });

    (addr, delivered_rx)
}

fn node_config(peer: &PeerAddress, max_proposal_txs: usize, deadline: Duration) -> Config {
    let mut config = Config::default();
    config.transport.listen_addr = "127.0.0.1:0".parse().unwrap();
    config.peers.addresses = vec![peer.clone()];
    config.ordering.max_proposal_txs = max_proposal_txs;
    config.ordering.deadline_interval = deadline;
    config
}

fn tx(tag: &[u8]) -> Transaction {
    Transaction::new(tag.to_vec(), &b"sig"[..])
}

#[test_log::test(tokio::test)]
async fn full_proposal_is_emitted_and_height_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (peer, mut delivered) = spawn_peer().await;

    // A one-hour deadline keeps the timer out of the picture: only the
    // queue-fill trigger can emit.
    let config = node_config(&peer, 3, Duration::from_secs(3600));

    let node = Node::new(config.clone(), dir.path().to_owned());
    let handle = node.start().await.unwrap();

    let mut client = OrderingClient::connect(handle.local_addr()).await.unwrap();
    for tag in [&b"t1"[..], b"t2", b"t3"] {
        client.submit_transaction(tx(tag)).await.unwrap();
    }

    let proposal = delivered.recv().await.unwrap();
    assert_eq!(proposal.height, Height::new(1));
    assert_eq!(
        proposal.transactions,
        vec![tx(b"t1"), tx(b"t2"), tx(b"t3")]
    );

    drop(client);
    handle.shutdown().await;

    // Restart over the same home directory: the next emission must continue
    // above the persisted height.
    let mut config = config;
    config.ordering.deadline_interval = Duration::from_millis(50);
    let node = Node::new(config, dir.path().to_owned());
    let handle = node.start().await.unwrap();

    let mut client = OrderingClient::connect(handle.local_addr()).await.unwrap();
    client.submit_transaction(tx(b"t4")).await.unwrap();

    let proposal = delivered.recv().await.unwrap();
    assert_eq!(proposal.height, Height::new(2));
    assert_eq!(proposal.transactions, vec![tx(b"t4")]);

    drop(client);
    handle.shutdown().await;
}

#[derive(Clone, Default)]
struct RecordingPublisher {
    published: Arc<Mutex<Vec<Proposal>>>,
}

impl RecordingPublisher {
    fn published(&self) -> Vec<Proposal> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProposalPublisher for RecordingPublisher {
    async fn publish(&self, proposal: Proposal, _peers: Vec<PeerAddress>) {
        self.published.lock().unwrap().push(proposal);
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread"))]
async fn concurrent_producers_lose_nothing_and_heights_have_no_gaps() {
    const PRODUCERS: u8 = 8;
    const TXS_PER_PRODUCER: u16 = 1000;
    const MAX_PROPOSAL_TXS: usize = 100;
    const TOTAL: usize = PRODUCERS as usize * TXS_PER_PRODUCER as usize;

    let dir = tempfile::tempdir().unwrap();
    let store = RedbHeightStore::open(dir.path().join("stress.redb"))
        .await
        .unwrap();

    let publisher = RecordingPublisher::default();
    let (sink, queue) = tx_queue();

    let core = OrderingCore::new(
        queue,
        MAX_PROPOSAL_TXS,
        Arc::new(store),
        Arc::new(StaticPeers::new(vec![PeerAddress::new("10.0.0.1:26658")])),
        Arc::new(ValidatingFactory::new(MAX_PROPOSAL_TXS)),
        Arc::new(publisher.clone()),
        StatusBus::new(),
        Metrics::new(),
    )
    .await
    .unwrap();

    let triggers = TriggerStream::start(core, Duration::from_millis(10), DispatchMode::Decoupled);

    let mut producers = Vec::new();
    for producer in 0..PRODUCERS {
        let sink = sink.clone();
        let notifier = triggers.notifier();

        producers.push(tokio::spawn(async move {
            for n in 0..TXS_PER_PRODUCER {
                let payload = [&[producer][..], &n.to_be_bytes()[..]].concat();
                assert!(sink.push(Transaction::new(payload, &b"sig"[..])));
                notifier.arrival().await;
            }
        }));
    }

    for producer in producers {
        producer.await.unwrap();
    }

    // Deadlines flush the tail; wait until everything surfaced.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let seen: usize = publisher.published().iter().map(Proposal::tx_count).sum();
        if seen >= TOTAL {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out with {seen}/{TOTAL} transactions published"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    triggers.shutdown().await;

    let published = publisher.published();

    // Size bound: 1 ≤ |txs| ≤ MAX_PROPOSAL_TXS for every proposal.
    for proposal in &published {
        assert!((1..=MAX_PROPOSAL_TXS).contains(&proposal.tx_count()));
    }

    // Monotonic heights with no gaps, starting just above the loaded height.
    let heights: Vec<u64> = published.iter().map(|p| p.height.as_u64()).collect();
    assert_eq!(heights, (1..=published.len() as u64).collect::<Vec<_>>());

    // No duplicates, no losses.
    let all: Vec<&Transaction> = published
        .iter()
        .flat_map(|p| p.transactions.iter())
        .collect();
    assert_eq!(all.len(), TOTAL);

    let unique: HashSet<_> = all.iter().map(|tx| tx.hash()).collect();
    assert_eq!(unique.len(), TOTAL);

    // Per-producer FIFO order is preserved across the whole run.
    for producer in 0..PRODUCERS {
        let sequence: Vec<u16> = all
            .iter()
            .filter(|tx| tx.payload()[0] == producer)
            .map(|tx| u16::from_be_bytes([tx.payload()[1], tx.payload()[2]]))
            .collect();
        assert_eq!(sequence, (0..TXS_PER_PRODUCER).collect::<Vec<_>>());
    }
}
