//! C8 — the global error envelope writer (spec §4.7).
//!
//! Any terminal status the orchestrator produces is converted into the
//! standardised JSON body `{timestamp,status,error,message,path}`, in that
//! field order. `path` is always the original request path, never the
//! upstream URL, and never leaks a stack trace.

use axum::body::Body;
use axum::response::Response;
use chrono::Local;
use http::StatusCode;
use serde::Serialize;

use ando_core::error::GatewayError;

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    timestamp: String,
    status: u16,
    error: &'a str,
    message: String,
    path: &'a str,
}

/// Render `err` against `path` as the standard JSON error response.
pub fn write(err: &GatewayError, path: &str) -> Response {
    let status = err.status_code();
    let envelope = ErrorEnvelope {
        timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        status,
        error: err.reason_phrase(),
        message: err.message(),
        path,
    };

    if status >= 500 {
        tracing::error!(status, path, error = %err, "gateway error response");
    } else {
        tracing::warn!(status, path, error = %err, "gateway rejection response");
    }

    match serde_json::to_vec(&envelope) {
        Ok(body) => Response::builder()
            .status(StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR))
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|_| fallback_response()),
        Err(err) => {
            tracing::error!(error = %err, "failed to serialise error envelope, falling back");
            fallback_response()
        }
    }
}

/// Hand-written fallback for the case serialisation itself fails (spec
/// §4.7): a fixed 500 body, no dynamic content that could fail to encode.
fn fallback_response() -> Response {
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"status":500,"error":"Internal Server Error","message":"An unexpected error occurred.","path":""}"#,
        ))
        .expect("a response built from a static, already-valid body never fails")
}
