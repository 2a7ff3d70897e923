//! The uniform JSON response envelope.
//!
//! Success: the caller's data, serialized verbatim, status 200.
//! Failure: `{"code": "...", "message": "..."}` with the status chosen by
//! [`decode`](crate::errno::decode).

use serde::Serialize;
use tracing::debug;

use crate::errno::{ApiError, ErrorInfo};
use crate::request::Request;
use crate::response::Response;

// Written when even the error body cannot be serialized.
const FALLBACK_BODY: &[u8] = br#"{"code":"InternalError","message":"Internal server error."}"#;

/// Writes either the error or the data of `result`.
pub fn write_response<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(data) => match serde_json::to_vec(&data) {
            Ok(body) => Response::json(body),
            Err(e) => write_error(&ApiError::from(e)),
        },
        Err(err) => write_error(&err),
    }
}

/// Writes the decoded form of `err`.
pub fn write_error(err: &ApiError) -> Response {
    let decoded = err.decode();
    debug!(status = decoded.status.as_u16(), code = %decoded.code, "writing error response");

    let info: ErrorInfo = decoded.info();
    let body = serde_json::to_vec(&info).unwrap_or_else(|_| FALLBACK_BODY.to_vec());
    Response::builder().status(decoded.status).json(body)
}

/// Catch-all handler for requests no route matched.
pub async fn not_found(_req: Request) -> Response {
    write_error(&ApiError::PageNotFound)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use http::{Method, StatusCode};
    use serde::ser::{Error as _, Serializer};

    use super::*;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to serialize"))
        }
    }

    fn json(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn success_is_verbatim_with_200() {
        let data = BTreeMap::from([("status", "ok")]);
        let res = write_response(Ok(data));
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), br#"{"status":"ok"}"#);
        assert_eq!(res.headers()[http::header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn failure_carries_code_and_message_only() {
        let res = write_response::<()>(Err(ApiError::InvalidParameter));
        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json(&res),
            serde_json::json!({"code": "InvalidParameter", "message": "Parameter verification failed."})
        );
    }

    #[test]
    fn serialization_failure_becomes_internal_error() {
        let res = write_response(Ok(Unserializable));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json(&res);
        assert_eq!(body["code"], "InternalError");
        assert_eq!(body["message"], "refusing to serialize");
    }

    #[tokio::test]
    async fn not_found_handler() {
        let res = not_found(Request::test(Method::DELETE, "/nowhere")).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(json(&res)["code"], "ResourceNotFound.PageNotFound");
    }
}
