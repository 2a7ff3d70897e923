use std::process::ExitCode;

use clap::Parser;

use miniblog::{app, logging, Cli, Config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("miniblog: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.log) {
        eprintln!("miniblog: {e}");
        return ExitCode::FAILURE;
    }

    match app::run(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "miniblog failed");
            ExitCode::FAILURE
        }
    }
}
