//! The miniblog service: its routes, and the run loop that ties the server
//! lifecycle to process signals.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::{Config, Mode};
use crate::envelope;
use crate::error::Error;
use crate::health;
use crate::pipeline::Pipeline;
use crate::router::Router;
use crate::server::{Server, ServerHandle, Signals, SHUTDOWN_TIMEOUT};

/// The route table: `GET /healthz`, everything else is `PageNotFound`.
pub fn router() -> Router {
    Router::new()
        .get("/healthz", health::healthz)
        .fallback(envelope::not_found)
}

/// Serves until SIGINT or SIGTERM, then shuts down within
/// [`SHUTDOWN_TIMEOUT`].
///
/// Startup failures and a listener that dies are returned. A shutdown that had
/// to abort connections is logged and still counts as a clean exit.
pub async fn run(config: &Config) -> Result<(), Error> {
    let pipeline = Pipeline::standard(router());
    if config.mode == Mode::Debug {
        for (method, path) in pipeline.router().routes() {
            debug!(%method, path, "route registered");
        }
        debug!(stages = ?pipeline.stage_names().collect::<Vec<_>>(), "middleware installed");
    }

    // Installed before binding so an early signal is not fatal.
    let signals = Signals::new()?;

    let handle = Server::new(pipeline).start(&config.bind_address()).await?;
    info!(addr = %handle.local_addr(), mode = %config.mode, "Start to listening the incoming requests on http address");

    serve_until_shutdown(handle, signals, SHUTDOWN_TIMEOUT).await
}

/// Waits for the first shutdown signal (or a failed listener), drains within
/// `deadline`, and turns the outcome into the process result.
pub async fn serve_until_shutdown(
    handle: ServerHandle,
    mut signals: Signals,
    deadline: Duration,
) -> Result<(), Error> {
    let trigger = handle.trigger();
    tokio::select! {
        res = signals.recv() => {
            let signal = res?;
            info!(%signal, "Shutting down server...");
            trigger.fire();
        }
        () = trigger.fired() => info!("Shutting down server..."),
    }

    let repeats = tokio::spawn(async move {
        while let Ok(signal) = signals.recv().await {
            if !trigger.fire() {
                warn!(%signal, "shutdown already in progress, ignoring signal");
            }
        }
    });

    let outcome = handle.shutdown(deadline).await;
    repeats.abort();
    exit_outcome(outcome)
}

/// A forced shutdown is still a clean exit; anything else that went wrong is
/// not.
fn exit_outcome(outcome: Result<(), Error>) -> Result<(), Error> {
    match outcome {
        Ok(()) => {
            info!("Server exiting");
            Ok(())
        }
        Err(e @ Error::ShutdownTimeout { .. }) => {
            error!(error = %e, "Server forced to shutdown");
            Ok(())
        }
        Err(e) => Err(e),
    }
}
