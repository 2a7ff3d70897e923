use chrono::Utc;
use http::header::{self, HeaderValue};

use super::{Context, Flow, Middleware};

pub const CACHE_CONTROL: &str = "no-cache, no-store, max-age=0, must-revalidate";
pub const EXPIRES: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

// IMF-fixdate, RFC 9110 §5.6.7.
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Tells clients and intermediaries not to cache anything.
pub struct NoCache;

impl Middleware for NoCache {
    fn name(&self) -> &'static str { "no_cache" }

    fn on_request(&self, ctx: &mut Context<'_>) -> Flow {
        ctx.set_header(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
        ctx.set_header(header::EXPIRES, HeaderValue::from_static(EXPIRES));

        let now = Utc::now().format(HTTP_DATE).to_string();
        if let Ok(v) = HeaderValue::from_str(&now) {
            ctx.set_header(header::LAST_MODIFIED, v);
        }
        Flow::Continue
    }
}
