use std::fs;
use std::path::Path;

use clap::Parser;
use tracing::info;

use crate::config::Config;
use crate::error::Error;

#[derive(Parser, Clone, Debug, Default, PartialEq)]
pub struct InitCmd {
    /// Overwrite an existing configuration file
    #[arg(long)]
    pub force: bool,
}

impl InitCmd {
    /// Writes a default `config.toml` into the home directory.
    pub fn run(&self, home_dir: &Path, config_file: &Path) -> Result<(), Error> {
        fs::create_dir_all(home_dir).map_err(|_| Error::ParentDir(home_dir.to_owned()))?;

        if config_file.exists() && !self.force {
            info!(
                "Configuration file already exists at {}, skipping (use --force to overwrite)",
                config_file.display()
            );
            return Ok(());
        }

        let rendered = toml::to_string_pretty(&Config::default())?;
        fs::write(config_file, rendered).map_err(|_| Error::WriteFile(config_file.to_owned()))?;

        info!("Wrote default configuration to {}", config_file.display());
        Ok(())
    }
}
