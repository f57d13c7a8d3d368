use clap::Parser;

/// Arguments of the `start` command. Execution lives in the binary crate,
/// which wires the configuration into the node runtime.
#[derive(Parser, Clone, Debug, Default, PartialEq)]
pub struct StartCmd {}
