//! Middleware layer.
//!
//! A middleware stage looks at the request, stages response headers, and then
//! either lets the request continue or ends it with a response of its own:
//!
//! ```text
//! recovery ┬ request_id → cors → no_cache → secure → router → handler
//!          └ (panic anywhere to the right → 500 envelope)
//! ```
//!
//! Stages run strictly in list order, one after the other, for every request.
//! Headers staged by a stage end up on whichever response finishes the
//! request: the handler's, a halting stage's, or the recovery guard's.
//!
//! | Stage | Effect |
//! |---|---|
//! | [`RequestId`] | propagates or generates `X-Request-ID` |
//! | [`Cors`] | answers `OPTIONS` preflight with 200, halts |
//! | [`NoCache`] | `Cache-Control`, `Expires`, `Last-Modified` |
//! | [`Secure`] | frame / sniff / XSS headers, HSTS over TLS |
//!
//! The recovery guard is not a stage: [`Pipeline`](crate::Pipeline) always
//! installs it outermost.

use http::header::{HeaderMap, HeaderName, HeaderValue};

use crate::request::Request;
use crate::response::Response;

mod cors;
mod no_cache;
pub(crate) mod recovery;
mod request_id;
mod secure;

pub use cors::Cors;
pub use no_cache::NoCache;
pub use request_id::{RequestId, X_REQUEST_ID};
pub use secure::Secure;

/// What a stage wants to happen next.
#[derive(Debug)]
pub enum Flow {
    /// Pass the request to the next stage (or the router).
    Continue,
    /// Stop here and send this response.
    Halt(Response),
}

/// A request interceptor.
pub trait Middleware: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn on_request(&self, ctx: &mut Context<'_>) -> Flow;
}

/// Per-request state visible to middleware: the request itself and the
/// response headers staged so far.
pub struct Context<'a> {
    request: Request,
    headers: &'a mut HeaderMap,
}

impl<'a> Context<'a> {
    pub(crate) fn new(request: Request, headers: &'a mut HeaderMap) -> Self {
        Self { request, headers }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn request_mut(&mut self) -> &mut Request { &mut self.request }

    /// Stage a response header, replacing any value staged earlier.
    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub(crate) fn into_request(self) -> Request { self.request }
}

/// The standard stages, in order.
pub fn standard() -> Vec<Box<dyn Middleware>> {
    vec![
        Box::new(RequestId),
        Box::new(Cors),
        Box::new(NoCache),
        Box::new(Secure),
    ]
}

#[cfg(test)]
pub(crate) fn run_stage(stage: &dyn Middleware, req: Request) -> (Flow, HeaderMap, Request) {
    let mut headers = HeaderMap::new();
    let mut ctx = Context::new(req, &mut headers);
    let flow = stage.on_request(&mut ctx);
    let req = ctx.into_request();
    (flow, headers, req)
}
