//! Structured logging setup.
//!
//! `tracing` events and spans, rendered by `tracing-subscriber` as either
//! human-readable console lines or one JSON object per line. `RUST_LOG`
//! overrides the configured level when set.

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogConfig, LogFormat, LogOutput};
use crate::error::Error;

/// Builds the filter: `RUST_LOG` if set and valid, else `config.level`.
pub fn filter(config: &LogConfig) -> Result<EnvFilter, Error> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| Error::Logging(e.to_string())),
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<(), Error> {
    let filter = filter(config)?;
    let writer = match config.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };
    let caller = !config.disable_caller;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match config.format {
        LogFormat::Console => registry
            .with(fmt::layer().with_writer(writer).with_file(caller).with_line_number(caller))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer)
                    .with_file(caller)
                    .with_line_number(caller),
            )
            .try_init(),
    };
    installed.map_err(|e| Error::Logging(e.to_string()))
}
