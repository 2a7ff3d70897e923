//! Route handlers and the endpoints the router stores them as.
//!
//! Any `async fn(Request) -> impl IntoResponse` is a [`Handler`]. On
//! registration the router wraps it in an [`Endpoint`], which remembers the
//! route pattern it answers for. When an endpoint serves a request it names
//! that route on the request span, so every log line of the request says which
//! route (or the fallback) produced the response.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::Span;

use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send + 'static>>;

/// Route name recorded for requests answered by the fallback handler.
pub(crate) const FALLBACK_ROUTE: &str = "<fallback>";

/// Implemented for every `async fn(Request) -> impl IntoResponse`, and for
/// closures of the same shape.
pub trait Handler: Send + Sync + 'static {
    #[doc(hidden)]
    fn respond(&self, req: Request) -> BoxFuture;
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn respond(&self, req: Request) -> BoxFuture {
        let fut = self(req);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// A handler bound to the route pattern it was registered under.
pub(crate) struct Endpoint {
    route: Arc<str>,
    handler: Arc<dyn Handler>,
}

impl Endpoint {
    pub(crate) fn new(route: &str, handler: impl Handler) -> Self {
        Self { route: Arc::from(route), handler: Arc::new(handler) }
    }

    pub(crate) fn fallback(handler: impl Handler) -> Self {
        Self::new(FALLBACK_ROUTE, handler)
    }

    pub(crate) fn route(&self) -> &str { &self.route }

    /// Records the route on the current span and runs the handler.
    pub(crate) fn serve(&self, req: Request) -> BoxFuture {
        Span::current().record("route", &*self.route);
        self.handler.respond(req)
    }
}
