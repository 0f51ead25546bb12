use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

use crate::{config::LogConfig, observability::RollingFileWriter, QueueError, QueueResult};

/// Install the global `tracing` subscriber described by `config`
///
/// Fails if the filter directive is invalid, the log file cannot be opened,
/// or a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> QueueResult<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| QueueError::Configuration(format!("log level {}: {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match &config.file {
        Some(path) => {
            let writer = RollingFileWriter::open(path, config.max_file_size, config.max_files)
                .map_err(|e| QueueError::Configuration(format!("log file {}: {}", path.display(), e)))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(writer));
            if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        None => {
            if config.json {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
    };

    installed.map_err(|e| QueueError::Configuration(format!("logging already initialised: {}", e)))
}
