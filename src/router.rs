//! Radix-tree request router.
//!
//! One tree per HTTP method. Anything no tree matches goes to the fallback
//! handler, which by default answers with the `PageNotFound` envelope.

use http::Method;
use matchit::Router as MatchitRouter;

use crate::envelope;
use crate::handler::{Endpoint, Handler};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup and hand it to a [`Pipeline`](crate::Pipeline).
pub struct Router {
    trees: Vec<(Method, MatchitRouter<Endpoint>)>,
    table: Vec<(Method, String)>,
    fallback: Endpoint,
}

impl Router {
    pub fn new() -> Self {
        Self {
            trees: Vec::new(),
            table: Vec::new(),
            fallback: Endpoint::fallback(envelope::not_found),
        }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with an existing route.
    /// Routes are registered once at startup.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        let idx = match self.trees.iter().position(|(m, _)| *m == method) {
            Some(idx) => idx,
            None => {
                self.trees.push((method.clone(), MatchitRouter::new()));
                self.trees.len() - 1
            }
        };
        if let Err(e) = self.trees[idx].1.insert(path, Endpoint::new(path, handler)) {
            panic!("invalid route `{method} {path}`: {e}");
        }
        self.table.push((method, path.to_owned()));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Replace the handler used when no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = Endpoint::fallback(handler);
        self
    }

    /// Registered routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.table.iter().map(|(m, p)| (m, p.as_str()))
    }

    /// Runs the endpoint registered for the request's method and path, or the
    /// fallback. Path parameters are attached to the request first.
    pub(crate) async fn dispatch(&self, mut req: Request) -> Response {
        let tree = self.trees.iter().find(|(m, _)| *m == req.method).map(|(_, t)| t);
        let endpoint = match tree.and_then(|t| t.at(req.uri.path()).ok()) {
            Some(found) => {
                req.params = found.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                found.value
            }
            None => &self.fallback,
        };
        endpoint.serve(req).await
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
