//! Per-request helpers that don't belong to any single pipeline stage:
//! client IP resolution (spec §6) and request-id propagation
//! (SPEC_FULL.md's "Request ID propagation" supplement).

use http::HeaderMap;

/// First non-empty `X-Forwarded-For` token (before the first `,`, trimmed);
/// else the socket's remote address; else `"unknown"` (spec §6).
pub fn client_ip(headers: &HeaderMap, remote_addr: Option<std::net::SocketAddr>) -> String {
    if let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = xff.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    remote_addr
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Inbound `X-Request-Id`, or a freshly minted one when absent. Passed
/// through to the upstream request and the access log event; no span or
/// sampling semantics are attached, matching spec §1's exclusion of
/// "distributed tracing semantics beyond header pass-through".
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
