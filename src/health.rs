//! Health-check handler.
//!
//! ```rust,no_run
//! use miniblog::{health, Router};
//!
//! let app = Router::new().get("/healthz", health::healthz);
//! ```

use serde::Serialize;
use tracing::info;

use crate::request::Request;
use crate::response::Json;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

/// Liveness probe. Always `200 OK` with `{"status":"ok"}`.
pub async fn healthz(_req: Request) -> Json<Health> {
    info!("Healthz function called");
    Json(Health { status: "ok" })
}
