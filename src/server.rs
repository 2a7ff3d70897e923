//! HTTP server lifecycle and graceful shutdown.
//!
//! ```text
//! Server::new ──start(addr)──▶ ServerHandle ──trigger().fire()──▶ shutdown(deadline)
//!   Created       bind ok        Listening       ShuttingDown          Stopped
//! ```
//!
//! `start` binds the socket and spawns the accept loop, then returns at once;
//! the caller is free to block on [`Signals::recv`]. Once shutdown begins:
//! 1. The accept loop stops and the listening socket is closed.
//! 2. Every open connection is told to finish its in-flight request and close.
//! 3. Connections still open when the deadline elapses are aborted, and
//!    [`ServerHandle::shutdown`] reports [`Error::ShutdownTimeout`].
//!
//! [`ShutdownTrigger::fire`] moves `Listening → ShuttingDown` exactly once, no
//! matter how many signals arrive or how many tasks call it.
//!
//! A listener that fails for good (anything but a dropped pending connection
//! or descriptor exhaustion) fires the trigger itself; `shutdown` then drains
//! as usual and reports [`Error::Accept`].

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::errno::ApiError;
use crate::error::Error;
use crate::pipeline::Pipeline;
use crate::request::Request;

/// How long in-flight requests get to finish once shutdown begins.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest request body read into memory unless [`Server::body_limit`] says
/// otherwise.
pub const DEFAULT_BODY_LIMIT: usize = 4 * 1024 * 1024;

// ── State ─────────────────────────────────────────────────────────────────────

/// Where the server is in its life.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ServerState {
    Created = 0,
    Listening = 1,
    ShuttingDown = 2,
    Stopped = 3,
}

impl ServerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Created,
            1 => Self::Listening,
            2 => Self::ShuttingDown,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: ServerState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> ServerState {
        ServerState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Moves `from → to`; false if the current state is not `from`.
    fn transition(&self, from: ServerState, to: ServerState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// The HTTP server, before it is bound.
pub struct Server {
    pipeline: Arc<Pipeline>,
    state: Arc<StateCell>,
    body_limit: usize,
}

impl Server {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            state: Arc::new(StateCell::new(ServerState::Created)),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Caps request bodies at `bytes`. Larger bodies are answered with the
    /// `BodyTooLarge` envelope without being read further.
    pub fn body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Binds `addr` and starts accepting connections in the background.
    ///
    /// `addr` is anything [`TcpListener::bind`] accepts, e.g. `0.0.0.0:8080`
    /// or `localhost:0`.
    pub async fn start(self, addr: &str) -> Result<ServerHandle, Error> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr: addr.to_owned(), source })?;
        let local_addr = listener.local_addr()?;

        self.state.transition(ServerState::Created, ServerState::Listening);
        info!(addr = %local_addr, "miniblog listening");

        let (stop_tx, stop_rx) = watch::channel(false);
        let trigger = ShutdownTrigger { state: self.state, stop: Arc::new(stop_tx) };
        let accept = tokio::spawn(accept_loop(
            listener,
            self.pipeline,
            self.body_limit,
            trigger.clone(),
            stop_rx,
        ));

        Ok(ServerHandle { local_addr, trigger, accept })
    }
}

// ── Running server ────────────────────────────────────────────────────────────

/// Starts shutdown from anywhere. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownTrigger {
    state: Arc<StateCell>,
    stop: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Moves `Listening → ShuttingDown` and stops the accept loop.
    ///
    /// Returns `true` only for the call that made the transition.
    pub fn fire(&self) -> bool {
        if !self.state.transition(ServerState::Listening, ServerState::ShuttingDown) {
            return false;
        }
        self.stop.send_replace(true);
        true
    }

    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Resolves once shutdown has begun, whoever started it.
    pub async fn fired(&self) {
        let mut stop = self.stop.subscribe();
        let _ = stop.wait_for(|stopped| *stopped).await;
    }
}

/// A bound, accepting server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    trigger: ShutdownTrigger,
    accept: JoinHandle<Connections>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> ServerState {
        self.trigger.state()
    }

    pub fn trigger(&self) -> ShutdownTrigger {
        self.trigger.clone()
    }

    /// Stops accepting, waits up to `deadline` for open connections to finish,
    /// then aborts whatever is left.
    ///
    /// Fires the trigger if nobody has yet. The server is `Stopped` when this
    /// returns, whatever the result.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), Error> {
        let expires = tokio::time::Instant::now() + deadline;
        self.trigger.fire();

        let result = match self.accept.await {
            Ok(conns) => conns.drain(expires, deadline).await,
            Err(e) => Err(Error::Task(e)),
        };

        self.trigger.state.0.store(ServerState::Stopped as u8, Ordering::Release);
        info!("miniblog stopped");
        result
    }
}

/// Connections handed over by the accept loop once it stops, plus the error
/// that stopped it, if any.
struct Connections {
    graceful: GracefulShutdown,
    tasks: JoinSet<()>,
    fault: Option<io::Error>,
}

impl Connections {
    async fn drain(self, expires: tokio::time::Instant, deadline: Duration) -> Result<(), Error> {
        let Connections { graceful, mut tasks, fault } = self;
        while tasks.try_join_next().is_some() {}
        info!(in_flight = tasks.len(), "draining connections");

        let drained = match tokio::time::timeout_at(expires, graceful.shutdown()).await {
            Ok(()) => {
                while tasks.join_next().await.is_some() {}
                Ok(())
            }
            Err(_) => {
                while tasks.try_join_next().is_some() {}
                let remaining = tasks.len();
                warn!(remaining, ?deadline, "shutdown deadline elapsed, closing connections");
                tasks.shutdown().await;
                Err(Error::ShutdownTimeout { deadline, remaining })
            }
        };

        match fault {
            Some(source) => Err(Error::Accept { source }),
            None => drained,
        }
    }
}

/// What an `accept` failure means for the listener.
#[derive(Debug, Eq, PartialEq)]
enum AcceptFailure {
    /// The pending connection went away before it was accepted.
    Connection,
    /// The process is out of descriptors or buffers; retry after a pause.
    Exhausted,
    /// The listening socket is unusable.
    Fatal,
}

fn classify(e: &io::Error) -> AcceptFailure {
    match e.kind() {
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::TimedOut => AcceptFailure::Connection,
        _ if is_exhaustion(e) => AcceptFailure::Exhausted,
        _ => AcceptFailure::Fatal,
    }
}

#[cfg(unix)]
fn is_exhaustion(e: &io::Error) -> bool {
    matches!(
        e.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_exhaustion(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::OutOfMemory
}

/// Pause between accept retries: 5ms, doubling, at most 1s. Reset by the next
/// accepted connection.
#[derive(Debug, Default)]
struct Backoff(Option<Duration>);

impl Backoff {
    const FIRST: Duration = Duration::from_millis(5);
    const MAX: Duration = Duration::from_secs(1);

    fn next_delay(&mut self) -> Duration {
        let delay = match self.0 {
            None => Self::FIRST,
            Some(prev) => (prev * 2).min(Self::MAX),
        };
        self.0 = Some(delay);
        delay
    }

    fn reset(&mut self) {
        self.0 = None;
    }
}

async fn accept_loop(
    listener: TcpListener,
    pipeline: Arc<Pipeline>,
    body_limit: usize,
    trigger: ShutdownTrigger,
    mut stop: watch::Receiver<bool>,
) -> Connections {
    let builder = ConnBuilder::new(TokioExecutor::new());
    let graceful = GracefulShutdown::new();
    let mut tasks = JoinSet::new();
    let mut backoff = Backoff::default();
    let mut fault = None;

    loop {
        tokio::select! {
            // Shutdown wins over queued connections.
            biased;

            _ = stop.changed() => {
                info!(in_flight = tasks.len(), "shutdown signal received, no longer accepting");
                break;
            }

            res = listener.accept() => {
                let (stream, remote_addr) = match res {
                    Ok(v) => {
                        backoff.reset();
                        v
                    }
                    Err(e) => match classify(&e) {
                        AcceptFailure::Connection => {
                            debug!("accept error: {e}");
                            continue;
                        }
                        AcceptFailure::Exhausted => {
                            let delay = backoff.next_delay();
                            warn!(?delay, "accept error: {e}; retrying");
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        AcceptFailure::Fatal => {
                            error!("listener failed: {e}");
                            trigger.fire();
                            fault = Some(e);
                            break;
                        }
                    },
                };

                let pipeline = Arc::clone(&pipeline);
                let svc = service_fn(move |req| {
                    let pipeline = Arc::clone(&pipeline);
                    async move { dispatch(pipeline, req, remote_addr, body_limit).await }
                });

                let conn = builder.serve_connection_with_upgrades(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());
                tasks.spawn(async move {
                    if let Err(e) = conn.await {
                        debug!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    Connections { graceful, tasks, fault }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Reads at most `body_limit` bytes of body, then hands the request to the
/// pipeline. Never fails: a body that is malformed or too large still goes
/// through every middleware stage and comes back as an error envelope.
async fn dispatch(
    pipeline: Arc<Pipeline>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
    body_limit: usize,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let req = match Limited::new(body, body_limit).collect().await {
        Ok(collected) => Request::new(parts, collected.to_bytes(), Some(remote_addr), false),
        Err(e) => {
            let err = if e.is::<LengthLimitError>() {
                ApiError::BodyTooLarge
            } else {
                ApiError::Bind
            };
            warn!(peer = %remote_addr, limit = body_limit, "failed to read request body: {e}");
            Request::rejected(parts, err, Some(remote_addr), false)
        }
    };

    Ok(pipeline.handle(req).await.into_inner())
}

// ── Shutdown signals ──────────────────────────────────────────────────────────

/// A process signal that asks for shutdown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "SIGINT",
            Self::Terminate => "SIGTERM",
        })
    }
}

/// Installed handlers for SIGINT and SIGTERM.
///
/// Once created, those signals no longer kill the process; they are queued
/// for [`recv`](Signals::recv). SIGKILL cannot be caught.
pub struct Signals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Signals {
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Waits for the next shutdown signal.
    pub async fn recv(&mut self) -> std::io::Result<ShutdownSignal> {
        #[cfg(unix)]
        {
            tokio::select! {
                Some(()) = self.interrupt.recv() => Ok(ShutdownSignal::Interrupt),
                Some(()) = self.terminate.recv() => Ok(ShutdownSignal::Terminate),
                else => Err(std::io::Error::other("signal streams closed")),
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            Ok(ShutdownSignal::Interrupt)
        }
    }
}

/// Blocks until SIGINT or SIGTERM arrives.
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    Signals::new()?.recv().await
}
