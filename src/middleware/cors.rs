use http::header::{self, HeaderValue};
use http::{Method, StatusCode};

use super::{Context, Flow, Middleware};
use crate::response::Response;

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "GET,POST,PUT,PATCH,DELETE,OPTIONS";
pub const ALLOW_HEADERS: &str = "authorization, origin, content-type, accept";
const ALLOW: &str = "HEAD,GET,POST,PUT,PATCH,DELETE,OPTIONS";

/// Answers browser preflight requests.
///
/// `OPTIONS` requests get permissive cross-origin headers and an empty `200`;
/// nothing after this stage runs for them. Every other method passes through
/// untouched.
pub struct Cors;

impl Middleware for Cors {
    fn name(&self) -> &'static str { "cors" }

    fn on_request(&self, ctx: &mut Context<'_>) -> Flow {
        if *ctx.request().method() != Method::OPTIONS {
            return Flow::Continue;
        }

        let preflight = Response::builder()
            .status(StatusCode::OK)
            .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(ALLOW_ORIGIN))
            .header(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS))
            .header(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS))
            .header(header::ALLOW, HeaderValue::from_static(ALLOW))
            .header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .no_body();
        Flow::Halt(preflight)
    }
}
