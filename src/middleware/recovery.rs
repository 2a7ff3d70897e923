//! Panic guard.
//!
//! Wraps the rest of the chain so a panicking stage or handler becomes a 500
//! envelope instead of a dropped connection.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tracing::error;

use crate::errno::ApiError;
use crate::response::{IntoResponse, Response};

/// Drives `fut` to completion, turning a panic into an internal-error response.
pub(crate) async fn guard<F>(fut: F) -> Response
where
    F: Future<Output = Response>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => {
            error!(panic = %panic_message(payload.as_ref()), "recovered from panic while serving request");
            ApiError::InternalServerError.into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
