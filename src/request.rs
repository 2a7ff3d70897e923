//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use crate::errno::ApiError;

/// An incoming HTTP request with its body fully read.
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    pub(crate) remote_addr: Option<SocketAddr>,
    pub(crate) tls: bool,
    pub(crate) request_id: Option<String>,
    pub(crate) rejection: Option<ApiError>,
}

impl Request {
    pub(crate) fn new(
        parts: http::request::Parts,
        body: Bytes,
        remote_addr: Option<SocketAddr>,
        tls: bool,
    ) -> Self {
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            params: HashMap::new(),
            remote_addr,
            tls,
            request_id: None,
            rejection: None,
        }
    }

    /// A request whose body could not be read. It still passes through every
    /// middleware stage; the pipeline then answers with `err` instead of
    /// routing it.
    pub(crate) fn rejected(
        parts: http::request::Parts,
        err: ApiError,
        remote_addr: Option<SocketAddr>,
        tls: bool,
    ) -> Self {
        let mut req = Self::new(parts, Bytes::new(), remote_addr, tls);
        req.rejection = Some(err);
        req
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Peer address of the connection, when the request came off a socket.
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    /// Whether the connection this request arrived on is TLS-terminated by
    /// this process.
    pub fn is_tls(&self) -> bool { self.tls }

    /// Returns a named path parameter.
    ///
    /// For a route `/posts/{id}`, `req.param("id")` on `/posts/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The correlation id attached by the request-id middleware.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub(crate) fn set_request_id(&mut self, id: String) {
        self.request_id = Some(id);
    }
}

#[cfg(test)]
impl Request {
    pub(crate) fn test(method: Method, uri: &str) -> Self {
        let (parts, ()) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        Self::new(parts, Bytes::new(), None, false)
    }

    pub(crate) fn with_header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.insert(name, value.parse().unwrap());
        self
    }

    pub(crate) fn with_rejection(mut self, err: ApiError) -> Self {
        self.rejection = Some(err);
        self
    }

    pub(crate) fn with_tls(mut self) -> Self {
        self.tls = true;
        self
    }
}
