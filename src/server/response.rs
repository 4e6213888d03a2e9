//! Uniform response helpers and the translation of handler failures into HTTP responses.
use std::fmt::Display;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

const NOT_FOUND_BODY: &str = "Not found";

/// Failures a handler can run into while serving a single request.
///
/// Every variant is answered with `500 Internal Server Error` and the failure message as a plain
/// text body. Test drivers match on that literal text, so the body is not structured.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The request body is not valid JSON or misses required fields.
    #[error("{0}")]
    InvalidRequest(#[from] serde_json::Error),

    /// The request is well-formed but carries an unsupported value.
    #[error("{0}")]
    InvalidArgument(String),

    /// Reading the request body failed.
    #[error("{0}")]
    Io(#[from] axum::Error),

    /// A flag evaluation was requested before the client has been constructed.
    #[error("client is not available")]
    ClientUnavailable,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        log::warn!(target: "ff_wrapper", "request failed: {}", self);
        write_error(&self)
    }
}

/// Serialize `payload` as the JSON body of a response with `status`.
///
/// Serialization failures are answered like any other handler failure.
pub fn write_json<T: Serialize>(status: StatusCode, payload: &T) -> Response {
    match serde_json::to_vec(payload) {
        Ok(body) => (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )],
            body,
        )
            .into_response(),
        Err(err) => HandlerError::from(err).into_response(),
    }
}

/// `404 Not Found` with body `Not found`.
pub fn write_not_found() -> Response {
    text(StatusCode::NOT_FOUND, NOT_FOUND_BODY.to_owned())
}

/// `500 Internal Server Error` with the failure message as body. The body is empty if the failure
/// has no message.
pub fn write_error(err: &impl Display) -> Response {
    text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

fn text(status: StatusCode, body: String) -> Response {
    (
        status,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )],
        body,
    )
        .into_response()
}
