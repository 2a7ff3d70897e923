use http::header::{HeaderName, HeaderValue};
use uuid::Uuid;

use super::{Context, Flow, Middleware};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const MAX_LEN: usize = 128;

/// Tags each request with a correlation id.
///
/// A usable `X-Request-ID` sent by the client is kept; otherwise a UUID v4 is
/// generated. The id is stored on the request and echoed in the response.
pub struct RequestId;

impl Middleware for RequestId {
    fn name(&self) -> &'static str { "request_id" }

    fn on_request(&self, ctx: &mut Context<'_>) -> Flow {
        let incoming = ctx.request()
            .headers()
            .get(&X_REQUEST_ID)
            .filter(|v| is_usable(v))
            .cloned();

        let value = match incoming {
            Some(v) => v,
            None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
                Ok(v) => v,
                Err(_) => return Flow::Continue,
            },
        };

        if let Ok(id) = value.to_str() {
            ctx.request_mut().set_request_id(id.to_owned());
        }
        ctx.set_header(X_REQUEST_ID, value);
        Flow::Continue
    }
}

fn is_usable(v: &HeaderValue) -> bool {
    let bytes = v.as_bytes();
    !bytes.is_empty() && bytes.len() <= MAX_LEN && bytes.iter().all(|b| b.is_ascii_graphic())
}
