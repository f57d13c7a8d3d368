//! Custom error messages for CLI helper functions.

use std::path::PathBuf;

/// Error messages for commands
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error creating parent directory
    #[error("Error creating parent directory: {}", .0.display())]
    ParentDir(PathBuf),

    /// Error writing file
    #[error("Error writing file: {}", .0.display())]
    WriteFile(PathBuf),

    /// Error determining home directory path
    #[error("Error determining home directory path")]
    DirPath,

    #[error("Error encoding configuration to TOML: {0}")]
    ToTOML(#[from] toml::ser::Error),

    #[error("Invalid log filter directives: {0}")]
    LogFilter(String),
}
