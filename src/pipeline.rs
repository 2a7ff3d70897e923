//! The request pipeline: panic guard, ordered middleware stages, router.

use std::time::Instant;

use http::HeaderMap;
use tracing::{debug, field, info_span, Instrument, Span};

use crate::envelope;
use crate::middleware::{self, recovery, Context, Flow, Middleware};
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// An explicit, fixed-order list of middleware stages in front of a router.
///
/// The order given at construction is the order every request sees; it cannot
/// change afterwards.
pub struct Pipeline {
    stages: Vec<Box<dyn Middleware>>,
    router: Router,
}

impl Pipeline {
    pub fn new(router: Router, stages: Vec<Box<dyn Middleware>>) -> Self {
        Self { stages, router }
    }

    /// `router` behind request-id, CORS, no-cache and secure headers.
    pub fn standard(router: Router) -> Self {
        Self::new(router, middleware::standard())
    }

    pub fn router(&self) -> &Router { &self.router }

    pub fn stage_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|s| s.name())
    }

    /// Runs one request through the guard, every stage and the router.
    ///
    /// A request whose body could not be read still goes through every stage,
    /// then gets its error envelope in place of the router's answer.
    pub async fn handle(&self, req: Request) -> Response {
        let span = info_span!(
            "request",
            method = %req.method(),
            path = %req.path(),
            peer = field::Empty,
            route = field::Empty,
            request_id = field::Empty,
        );
        if let Some(peer) = req.remote_addr() {
            span.record("peer", field::display(peer));
        }
        let started = Instant::now();
        let mut staged = HeaderMap::new();

        let mut res = recovery::guard(self.run(req, &mut staged))
            .instrument(span.clone())
            .await;
        res.merge_headers(&staged);

        span.in_scope(|| {
            debug!(
                status = res.status_code().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
        });
        res
    }

    async fn run(&self, req: Request, staged: &mut HeaderMap) -> Response {
        let mut ctx = Context::new(req, staged);

        for stage in &self.stages {
            let flow = stage.on_request(&mut ctx);
            if let Some(id) = ctx.request().request_id() {
                Span::current().record("request_id", id);
            }
            if let Flow::Halt(res) = flow {
                debug!(stage = stage.name(), "request halted by middleware");
                return res;
            }
        }

        let mut req = ctx.into_request();
        if let Some(err) = req.rejection.take() {
            debug!(error = %err, "request rejected before routing");
            return envelope::write_error(&err);
        }
        self.router.dispatch(req).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use http::{header, Method, StatusCode};

    use super::*;
    use crate::errno::ApiError;
    use crate::middleware::X_REQUEST_ID;

    /// Appends its label to a shared log, optionally halting.
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        halt: bool,
    }

    impl Middleware for Recorder {
        fn name(&self) -> &'static str { self.label }

        fn on_request(&self, _ctx: &mut Context<'_>) -> Flow {
            self.log.lock().unwrap().push(self.label);
            if self.halt {
                Flow::Halt(Response::status(StatusCode::IM_A_TEAPOT))
            } else {
                Flow::Continue
            }
        }
    }

    struct Explode;

    impl Middleware for Explode {
        fn name(&self) -> &'static str { "explode" }

        fn on_request(&self, _ctx: &mut Context<'_>) -> Flow {
            panic!("stage exploded")
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, halt: bool) -> Box<dyn Middleware> {
        Box::new(Recorder { label, log: Arc::clone(log), halt })
    }

    async fn ok(_req: Request) -> &'static str { "ok" }

    async fn boom(_req: Request) -> Response { panic!("handler exploded") }

    #[tokio::test]
    async fn stages_run_in_list_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            Router::new().get("/", ok),
            vec![recorder("a", &log, false), recorder("b", &log, false), recorder("c", &log, false)],
        );

        let res = pipeline.handle(Request::test(Method::GET, "/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn halt_skips_later_stages_and_router() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            Router::new().get("/", boom),
            vec![recorder("a", &log, true), recorder("b", &log, false)],
        );

        let res = pipeline.handle(Request::test(Method::GET, "/")).await;
        assert_eq!(res.status_code(), StatusCode::IM_A_TEAPOT);
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn standard_order() {
        let pipeline = Pipeline::standard(Router::new());
        let names: Vec<_> = pipeline.stage_names().collect();
        assert_eq!(names, vec!["request_id", "cors", "no_cache", "secure"]);
    }

    #[tokio::test]
    async fn handler_panic_keeps_staged_headers() {
        let pipeline = Pipeline::standard(Router::new().get("/boom", boom));

        let res = pipeline.handle(Request::test(Method::GET, "/boom")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().contains_key(X_REQUEST_ID));
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");

        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], "InternalError");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stage_panic_is_recovered() {
        let pipeline = Pipeline::new(Router::new().get("/", ok), vec![Box::new(Explode)]);

        let res = pipeline.handle(Request::test(Method::GET, "/")).await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn preflight_skips_header_stages() {
        let pipeline = Pipeline::standard(Router::new().get("/", ok));

        let res = pipeline.handle(Request::test(Method::OPTIONS, "/")).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert!(res.body().is_empty());
        assert!(res.headers().contains_key(X_REQUEST_ID));
        assert!(!res.headers().contains_key(header::CACHE_CONTROL));
        assert!(!res.headers().contains_key(header::X_FRAME_OPTIONS));
    }

    #[tokio::test]
    async fn rejected_request_runs_every_stage() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stages = middleware::standard();
        stages.push(recorder("tail", &log, false));
        let pipeline = Pipeline::new(Router::new().post("/", ok), stages);

        let req = Request::test(Method::POST, "/").with_rejection(ApiError::Bind);
        let res = pipeline.handle(req).await;

        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(*log.lock().unwrap(), vec!["tail"]);
        assert!(res.headers().contains_key(X_REQUEST_ID));
        assert!(res.headers().contains_key(header::CACHE_CONTROL));
        assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");

        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["code"], "InvalidParameter.BindError");
    }

    #[tokio::test]
    async fn every_non_preflight_response_carries_headers() {
        let pipeline = Pipeline::standard(Router::new().get("/", ok));

        for (method, path) in [(Method::GET, "/"), (Method::POST, "/"), (Method::GET, "/missing")] {
            let res = pipeline.handle(Request::test(method, path)).await;
            assert_eq!(
                res.headers()[header::CACHE_CONTROL],
                "no-cache, no-store, max-age=0, must-revalidate"
            );
            assert_eq!(res.headers()[header::X_FRAME_OPTIONS], "DENY");
            assert!(res.headers().contains_key(header::EXPIRES));
            assert!(res.headers().contains_key(header::LAST_MODIFIED));
        }
    }
}
