//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "miniblog",
    version,
    about = "A small, practical Rust HTTP service",
    long_about = "A small, practical Rust HTTP service: health check, \
                  uniform JSON responses, and graceful shutdown."
)]
pub struct Cli {
    /// Path to the miniblog configuration file. Without it,
    /// $HOME/.miniblog/miniblog.toml is used if present.
    #[arg(short, long, env = "MINIBLOG_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}
