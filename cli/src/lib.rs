//! Command-line interface, configuration and process bootstrap helpers for
//! the citrine ordering node.

pub mod args;
pub mod cmd;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
