use http::header::{self, HeaderValue};

use super::{Context, Flow, Middleware};

/// Adds the security and resource-access headers. Never halts.
///
/// `Strict-Transport-Security` is only sent when this process terminated TLS
/// for the connection.
pub struct Secure;

impl Middleware for Secure {
    fn name(&self) -> &'static str { "secure" }

    fn on_request(&self, ctx: &mut Context<'_>) -> Flow {
        ctx.set_header(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        ctx.set_header(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        ctx.set_header(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        ctx.set_header(header::X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
        if ctx.request().is_tls() {
            ctx.set_header(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000"),
            );
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::middleware::run_stage;
    use crate::request::Request;

    #[test]
    fn plain_connection_has_no_hsts() {
        let (flow, headers, _) = run_stage(&Secure, Request::test(Method::GET, "/"));
        assert!(matches!(flow, Flow::Continue));

        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers[header::X_XSS_PROTECTION], "1; mode=block");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
    }

    #[test]
    fn tls_connection_gets_hsts() {
        let (_, headers, _) = run_stage(&Secure, Request::test(Method::GET, "/").with_tls());
        assert_eq!(headers[header::STRICT_TRANSPORT_SECURITY], "max-age=31536000");
    }
}
