use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::Error;

/// Installs the global tracing subscriber.
///
/// Returns a guard that must be held for the lifetime of the process when
/// logging to a file; dropping it flushes and stops the background writer.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>, Error> {
    let filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| Error::LogFilter(e.to_string()))?;

    match &config.log_file {
        Some(path) => {
            let appender = tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                path.file_name().unwrap_or_else(|| "citrine.log".as_ref()),
            );
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false);

            match config.log_format {
                LogFormat::Plaintext => builder.init(),
                LogFormat::Json => builder.json().init(),
            }

            Ok(Some(guard))
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);

            match config.log_format {
                LogFormat::Plaintext => builder.init(),
                LogFormat::Json => builder.json().init(),
            }

            Ok(None)
        }
    }
}
