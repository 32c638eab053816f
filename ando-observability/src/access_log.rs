//! Per-request access logging (AMBIENT-LOGGING).
//!
//! One structured event per request: `tracing::info!` for 2xx/3xx/4xx,
//! `tracing::error!` for 5xx, carrying the fields a log shipper needs to
//! reconstruct an access log line without re-deriving them from raw spans.

use serde::{Deserialize, Serialize};

/// Structured access log entry. Kept serialisable so the same shape a
/// remote log sink would consume (spec §1's "logging transport" external
/// collaborator) is what gets emitted locally via `tracing`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub project: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: f64,
    pub client_ip: String,
    pub request_id: String,
}

/// Emit the access log event for a completed request.
pub fn record(entry: &AccessLogEntry) {
    if entry.status >= 500 {
        tracing::error!(
            project = %entry.project,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            latency_ms = entry.latency_ms,
            client_ip = %entry.client_ip,
            request_id = %entry.request_id,
            "request failed"
        );
    } else if entry.status >= 400 {
        tracing::warn!(
            project = %entry.project,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            latency_ms = entry.latency_ms,
            client_ip = %entry.client_ip,
            request_id = %entry.request_id,
            "request rejected"
        );
    } else {
        tracing::info!(
            project = %entry.project,
            method = %entry.method,
            path = %entry.path,
            status = entry.status,
            latency_ms = entry.latency_ms,
            client_ip = %entry.client_ip,
            request_id = %entry.request_id,
            "request completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_does_not_panic_across_status_classes() {
        for status in [200, 404, 500] {
            record(&AccessLogEntry {
                project: "/shop".to_string(),
                method: "GET".to_string(),
                path: "/shop/items".to_string(),
                status,
                latency_ms: 12.5,
                client_ip: "1.2.3.4".to_string(),
                request_id: "req-1".to_string(),
            });
        }
    }
}
