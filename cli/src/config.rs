use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre;
use serde::{Deserialize, Serialize};

use citrine_types::PeerAddress;

/// Top-level node configuration, loaded from `config.toml` in the home
/// directory with `CITRINE__`-prefixed environment overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// A custom human-readable name for this node
    pub moniker: String,

    /// Ordering policy options
    pub ordering: OrderingConfig,

    /// Transport configuration options
    pub transport: TransportConfig,

    /// Ledger peer set configuration options
    pub peers: PeersConfig,

    /// Storage configuration options
    pub storage: StorageConfig,

    /// Log configuration options
    pub logging: LoggingConfig,

    /// Metrics configuration options
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            moniker: "citrine".to_owned(),
            ordering: OrderingConfig::default(),
            transport: TransportConfig::default(),
            peers: PeersConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Policy knobs of the ordering state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    /// Upper bound on transactions per proposal; reaching it triggers an
    /// immediate emission.
    pub max_proposal_txs: usize,

    /// Cadence of deadline-triggered emission checks.
    #[serde(with = "humantime_serde")]
    pub deadline_interval: Duration,

    /// Where emission work runs relative to the task that produced the
    /// trigger.
    pub dispatch: DispatchMode,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            max_proposal_txs: 10,
            deadline_interval: Duration::from_millis(500),
            dispatch: DispatchMode::Decoupled,
        }
    }
}

/// Trigger execution mode.
///
/// In cooperative mode the task delivering a trigger also runs the emission;
/// inbound handlers pay the cost of proposal emission synchronously. In
/// decoupled mode triggers are handed off to a dedicated worker and inbound
/// handlers return immediately after enqueueing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    Cooperative,
    #[default]
    Decoupled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Address at which the inbound transaction endpoint listens.
    pub listen_addr: SocketAddr,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:26658".parse().expect("valid default address"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeersConfig {
    /// Static ledger peer list used when no peers file is configured.
    pub addresses: Vec<PeerAddress>,

    /// Optional TOML file re-read at every snapshot query, for peer sets
    /// maintained outside the node.
    pub peers_file: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file holding the last emitted proposal height, relative to
    /// the home directory unless absolute.
    pub db_file: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: PathBuf::from("ordering.redb"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives, e.g. `citrine=debug,info`.
    pub log_level: String,

    /// Output format of the subscriber.
    pub log_format: LogFormat,

    /// Optional log file; when set, output goes to the file instead of
    /// stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "citrine=debug,info".to_owned(),
            log_format: LogFormat::Plaintext,
            log_file: None,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plaintext,
    Json,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether the Prometheus endpoint is enabled.
    pub enabled: bool,

    /// Address at which the `/metrics` endpoint listens.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1:29000".parse().expect("valid default address"),
        }
    }
}

pub fn load_config(path: impl AsRef<Path>, prefix: Option<&str>) -> eyre::Result<Config> {
    ::config::Config::builder()
        .add_source(::config::File::from(path.as_ref()))
        .add_source(
            ::config::Environment::with_prefix(prefix.unwrap_or("CITRINE")).separator("__"),
        )
        .build()?
        .try_deserialize()
        .map_err(Into::into)
}
