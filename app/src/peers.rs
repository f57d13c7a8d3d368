//! Ledger peer directory.
//!
//! Snapshots are point-in-time; the core tolerates stale snapshots by design.
//! A proposal broadcast to an outdated set is acceptable, downstream
//! consensus reconciles disagreement.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use citrine_types::PeerAddress;

/// Snapshot query over the current ledger peer set. `None` signals that the
/// directory could not produce a snapshot at all.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
    async fn peers(&self) -> Option<Vec<PeerAddress>>;
}

/// Fixed peer set taken from the node configuration.
pub struct StaticPeers {
    addresses: Vec<PeerAddress>,
}

impl StaticPeers {
    pub fn new(addresses: Vec<PeerAddress>) -> Self {
        Self { addresses }
    }
}

#[async_trait]
impl PeerDirectory for StaticPeers {
    async fn peers(&self) -> Option<Vec<PeerAddress>> {
        Some(self.addresses.clone())
    }
}

#[derive(Deserialize)]
struct PeersDocument {
    addresses: Vec<PeerAddress>,
}

/// Peer set maintained outside the node in a TOML file.
///
/// The file is re-read on every query, so edits take effect on the next
/// emission without a restart.
pub struct PeersFile {
    path: PathBuf,
}

impl PeersFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PeerDirectory for PeersFile {
    async fn peers(&self) -> Option<Vec<PeerAddress>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read peers file");
                return None;
            }
        };

        match toml::from_str::<PeersDocument>(&contents) {
            Ok(document) => Some(document.addresses),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to parse peers file");
                None
            }
        }
    }
}
