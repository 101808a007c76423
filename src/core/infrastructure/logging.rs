//! Process-wide `tracing` subscriber: colored lines on stderr plus an append-only log file.
//!
//! Library code only emits events through the `tracing` macros; installing the subscriber
//! is left to the binary so tests and embedders stay free of global logger state.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("cannot open log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("logging is already initialised: {0}")]
    Init(String),
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_logging(log_file: Option<&Path>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_writer(io::stderr).with_target(false);

    let file_layer = match log_file {
        Some(path) => {
            let file = open_log_file(path).map_err(|source| LoggingError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

fn open_log_file(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
