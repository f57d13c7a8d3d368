use std::net::SocketAddr;

use clap::Parser;

/// Arguments of the `submit` command: sends transactions to a running node's
/// ordering endpoint. Execution lives in the binary crate.
#[derive(Parser, Clone, Debug, PartialEq)]
pub struct SubmitCmd {
    /// Ordering endpoint to submit to (default: the configured listen address)
    #[arg(long, value_name = "ADDR")]
    pub addr: Option<SocketAddr>,

    /// Transaction payload, submitted verbatim
    #[arg(long, value_name = "PAYLOAD")]
    pub payload: String,

    /// Number of copies to submit; more than one is sent as a single batch
    #[arg(long, default_value_t = 1)]
    pub count: usize,
}
