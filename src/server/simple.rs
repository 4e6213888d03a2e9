//! SDK-level routes under `/sdk`.
use axum::{http::StatusCode, response::Response, Router};
use serde::Serialize;

use super::{
    response::write_json,
    routes::{get_only, AppState, RouteGroup},
};

/// Version reported by `/sdk/version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Body of `GET /sdk/version`.
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    /// Version of the SDK under test.
    pub version: &'static str,
}

/// `GET /sdk/version`.
pub struct SimpleRoutes;

impl RouteGroup for SimpleRoutes {
    fn install(&self, router: Router<AppState>) -> Router<AppState> {
        router.route("/sdk/version", get_only(version))
    }
}

async fn version() -> Response {
    write_json(
        StatusCode::OK,
        &VersionResponse {
            version: SDK_VERSION,
        },
    )
}
