//! Command-line arguments for the citrine node.
//!
//! Configuration is read from the files found in the directory provided with
//! the `--home` global parameter; individual flags override file values.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use directories::BaseDirs;

use crate::cmd::init::InitCmd;
use crate::cmd::start::StartCmd;
use crate::cmd::submit::SubmitCmd;
use crate::config::LogFormat;
use crate::error::Error;

const CITRINE_FOLDER: &str = ".citrine";
const CONFIG_FILE: &str = "config.toml";

#[derive(Parser, Clone, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Home directory for citrine (default: `$HOME/.citrine`)
    #[arg(long, global = true, value_name = "HOME_DIR")]
    pub home: Option<PathBuf>,

    /// Log level (default: `citrine=debug,info`)
    #[arg(long, global = true, value_name = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format (default: `plaintext`)
    #[arg(long, global = true, value_name = "LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the ordering node
    Start(StartCmd),

    /// Initialize the home directory with a default configuration
    Init(InitCmd),

    /// Submit one or more transactions to a running node
    Submit(SubmitCmd),
}

impl Default for Commands {
    fn default() -> Self {
        Self::Start(StartCmd::default())
    }
}

impl Args {
    /// new returns a new instance of the arguments.
    pub fn new() -> Self {
        Self::parse()
    }

    /// get_home_dir returns the application home folder.
    /// Defaults to `$HOME/.citrine`.
    pub fn get_home_dir(&self) -> Result<PathBuf, Error> {
        match self.home {
            Some(ref path) => Ok(path.clone()),
            None => Ok(BaseDirs::new()
                .ok_or(Error::DirPath)?
                .home_dir()
                .join(CITRINE_FOLDER)),
        }
    }

    /// get_config_file returns the node configuration file.
    /// Typically, `$HOME/.citrine/config.toml`.
    pub fn get_config_file(&self) -> Result<PathBuf, Error> {
        Ok(self.get_home_dir()?.join(CONFIG_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_home_wins() {
        let args = Args::parse_from(["citrine", "--home", "/tmp/citrine-test", "init"]);
        assert_eq!(args.get_home_dir().unwrap(), PathBuf::from("/tmp/citrine-test"));
        assert_eq!(
            args.get_config_file().unwrap(),
            PathBuf::from("/tmp/citrine-test/config.toml")
        );
    }

    #[test]
    fn submit_parses_batch_size() {
        let args = Args::parse_from([
            "citrine", "submit", "--addr", "127.0.0.1:4000", "--payload", "hello", "--count", "3",
        ]);

        match args.command {
            Commands::Submit(cmd) => {
                assert_eq!(cmd.payload, "hello");
                assert_eq!(cmd.count, 3);
            }
            other => panic!("expected submit, got {other:?}"),
        }
    }
}
