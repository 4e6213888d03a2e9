//! Flag evaluation routes under `/api/1.0`.
use std::str::FromStr;

use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::StatusCode,
    response::Response,
    Router,
};
use serde::{Deserialize, Serialize};

use super::{
    response::{write_json, HandlerError},
    routes::{get_only, post_only, AppState, RouteGroup},
};
use crate::Target;

/// Largest accepted `check_flag` body.
const MAX_BODY_SIZE: usize = 1024 * 1024;

/// Body of `POST /api/1.0/check_flag`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlagCheckRequest {
    /// One of `boolean`, `int`, `string` or `json`. Parsed into [`FlagKind`] at dispatch.
    pub flag_kind: String,
    /// Flag to evaluate.
    pub flag_key: String,
    /// Target to evaluate the flag for.
    pub target: TargetRequest,
}

/// Target descriptor of a [`FlagCheckRequest`].
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRequest {
    #[allow(missing_docs)]
    pub target_identifier: String,
    #[allow(missing_docs)]
    pub target_name: String,
}

impl From<TargetRequest> for Target {
    fn from(value: TargetRequest) -> Target {
        Target::builder(value.target_identifier)
            .name(value.target_name)
            .is_private(false)
            .build()
    }
}

/// Body of a successful `check_flag` response. The value is always rendered as a string; callers
/// parse it according to the kind they requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagCheckResponse {
    #[allow(missing_docs)]
    pub flag_key: String,
    #[allow(missing_docs)]
    pub flag_value: String,
}

/// Body of `GET /api/1.0/ping`.
#[derive(Debug, Serialize)]
pub struct PongResponse {
    #[allow(missing_docs)]
    pub ok: bool,
}

/// Declared value type of a flag, selecting the typed evaluation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    #[allow(missing_docs)]
    Boolean,
    #[allow(missing_docs)]
    Int,
    #[allow(missing_docs)]
    String,
    #[allow(missing_docs)]
    Json,
}

impl FromStr for FlagKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boolean" => Ok(FlagKind::Boolean),
            "int" => Ok(FlagKind::Int),
            "string" => Ok(FlagKind::String),
            "json" => Ok(FlagKind::Json),
            _ => Err(HandlerError::InvalidArgument(format!("Unknown kind: '{s}'"))),
        }
    }
}

/// `GET /api/1.0/ping` and `POST /api/1.0/check_flag`.
pub struct ApiRoutes;

impl RouteGroup for ApiRoutes {
    fn install(&self, router: Router<AppState>) -> Router<AppState> {
        router
            .route("/api/1.0/ping", get_only(ping))
            .route("/api/1.0/check_flag", post_only(check_flag))
    }
}

async fn ping() -> Response {
    write_json(StatusCode::OK, &PongResponse { ok: true })
}

async fn check_flag(
    State(state): State<AppState>,
    body: Body,
) -> Result<Response, HandlerError> {
    let body = to_bytes(body, MAX_BODY_SIZE).await?;
    let request: FlagCheckRequest = serde_json::from_slice(&body)?;
    let FlagCheckRequest {
        flag_kind,
        flag_key,
        target,
    } = request;
    let target = Target::from(target);

    log::info!(target: "ff_wrapper",
        flag_key = flag_key.as_str(),
        flag_kind = flag_kind.as_str(),
        target_identifier = target.identifier.as_str();
        "checking flag");

    let Some(client) = state.client() else {
        log::error!(target: "ff_wrapper", "flag check requested before the client was created");
        return Err(HandlerError::ClientUnavailable);
    };

    let flag_value = match flag_kind.parse::<FlagKind>()? {
        FlagKind::Boolean => client.bool_variation(&flag_key, &target, false).to_string(),
        FlagKind::Int => client.number_variation(&flag_key, &target, 0.0).to_string(),
        FlagKind::String => client.string_variation(&flag_key, &target, ""),
        FlagKind::Json => client
            .json_variation(&flag_key, &target, serde_json::json!({}))
            .to_string(),
    };

    Ok(write_json(
        StatusCode::OK,
        &FlagCheckResponse {
            flag_key,
            flag_value,
        },
    ))
}
