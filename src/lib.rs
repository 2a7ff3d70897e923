//! # miniblog
//!
//! A minimal HTTP service bootstrap. Nothing more. Nothing less.
//!
//! What it does:
//!
//! - **Request lifecycle**: every request passes a panic guard and an ordered
//!   middleware chain (request id → CORS → no-cache → security headers) before
//!   reaching the router.
//! - **Uniform responses**: success bodies are the handler's data; failures are
//!   always `{"code": "...", "message": "..."}` with a status from the decoder.
//! - **Graceful shutdown**: SIGINT / SIGTERM stop the listener, in-flight
//!   requests get five seconds, then remaining connections are closed.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use miniblog::{health, wait_for_shutdown_signal, Pipeline, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), miniblog::Error> {
//!     let app = Router::new().get("/healthz", health::healthz);
//!
//!     let handle = Server::new(Pipeline::standard(app)).start("0.0.0.0:8080").await?;
//!     wait_for_shutdown_signal().await?;
//!     handle.shutdown(Duration::from_secs(5)).await
//! }
//! ```
//!
//! ## Errors
//!
//! ```rust
//! use http::StatusCode;
//! use miniblog::{ApiError, Errno, Json, Request};
//!
//! async fn create_post(req: Request) -> Result<Json<&'static str>, ApiError> {
//!     if req.body().is_empty() {
//!         return Err(ApiError::Bind);
//!     }
//!     Err(Errno::new(StatusCode::CONFLICT, "PostAlreadyExist", "Post already exists.").into())
//! }
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod envelope;
pub mod errno;
mod error;
mod handler;
pub mod health;
pub mod logging;
pub mod middleware;
mod pipeline;
mod request;
mod response;
mod router;
pub mod server;

pub use cli::Cli;
pub use config::Config;
pub use errno::{decode, ApiError, DecodedError, Errno, ErrorInfo};
pub use error::Error;
pub use handler::Handler;
pub use pipeline::Pipeline;
pub use request::Request;
pub use response::{IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::{
    wait_for_shutdown_signal, Server, ServerHandle, ServerState, ShutdownSignal, ShutdownTrigger,
    Signals, DEFAULT_BODY_LIMIT, SHUTDOWN_TIMEOUT,
};
