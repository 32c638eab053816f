use std::time::Duration;

use ando_core::config::ProjectConfig;
use ando_core::identity::Identity;
use ando_core::registry::strip_prefix;
use axum::body::Body;
use axum::response::Response;
use http::{HeaderMap, StatusCode};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Headers never copied across the proxy boundary, case-insensitive (spec
/// §4.5). Applies to both the upstream request and the response streamed
/// back to the client. `X-User-*` is reserved for the identity the gateway
/// itself asserts — a client- or upstream-supplied copy is dropped.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
    "proxy-authorization",
    "proxy-authenticate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardError {
    InvalidUpstreamUri,
    Timeout,
    Unreachable,
}

/// What the forwarder produced. `response` is always what the client
/// receives, including a passed-through upstream 5xx; `is_upstream_failure`
/// is carried alongside it so the breaker wrapping this call can record a
/// failure without the forwarder having to know about breakers at all.
pub struct ForwardOutcome {
    pub response: Response,
    pub is_upstream_failure: bool,
}

/// Single pooled outbound client shared by every forwarded request (C6,
/// spec §4.5). One `Forwarder` per process; never built per-request.
pub struct Forwarder {
    client: reqwest::Client,
    /// `gatewayConfig.globalTimeout` (spec §6): the upstream-call deadline
    /// applied when a project sets no `timeLimiter` of its own. `None`
    /// means no wall-clock cap beyond the breaker's own policy.
    default_timeout: Option<Duration>,
}

impl Forwarder {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("a client built from static, already-validated settings never fails");
        Self {
            client,
            default_timeout,
        }
    }

    pub async fn forward(
        &self,
        method: http::Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &HeaderMap,
        body: Body,
        project: &ProjectConfig,
        identity: &Identity,
    ) -> Result<ForwardOutcome, ForwardError> {
        let downstream_path = strip_prefix(path, &project.prefix);
        let mut url = format!(
            "{}{}",
            project.target_url.trim_end_matches('/'),
            downstream_path
        );
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        // Reject anything reqwest's own URL parser would choke on up front,
        // so a malformed targetUrl surfaces as our own error taxonomy and
        // not a bare reqwest::Error the caller has to re-classify.
        url.parse::<reqwest::Url>()
            .map_err(|_| ForwardError::InvalidUpstreamUri)?;

        let reqwest_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .map_err(|_| ForwardError::InvalidUpstreamUri)?;

        let mut builder = self
            .client
            .request(reqwest_method, &url)
            .headers(filter_headers(headers))
            .header("X-User-Id", identity.id.as_str())
            .header("X-User-Role", identity.role.as_str())
            .header("X-User-Plan", identity.plan.as_str())
            .body(reqwest::Body::wrap_stream(body.into_data_stream()));

        // Per-project `timeLimiter` wins; otherwise fall back to the
        // gateway-wide `globalTimeout`, if either is configured.
        let timeout = project
            .time_limiter
            .as_ref()
            .map(|tl| Duration::from_millis(tl.timeout_ms))
            .or(self.default_timeout);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let upstream = builder.send().await.map_err(|err| {
            let classified = classify_error(&err);
            tracing::warn!(error = %err, prefix = %project.prefix, ?classified, "upstream call failed");
            classified
        })?;

        let status = upstream.status();
        let is_upstream_failure = status.is_server_error();
        if is_upstream_failure {
            tracing::error!(status = %status, prefix = %project.prefix, "upstream returned a server error");
        }
        let response_headers = filter_headers(upstream.headers());
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        *response.headers_mut() = response_headers;

        Ok(ForwardOutcome {
            response,
            is_upstream_failure,
        })
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new(None)
    }
}

fn classify_error(err: &reqwest::Error) -> ForwardError {
    if err.is_timeout() {
        ForwardError::Timeout
    } else {
        ForwardError::Unreachable
    }
}

fn filter_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn is_hop_by_hop(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    HOP_BY_HOP.contains(&lower.as_str()) || lower.starts_with("x-user-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn project(target_url: &str) -> ProjectConfig {
        let yaml = format!(
            r#"
prefix: /shop
target_url: "{target_url}"
auth_type: TOKEN
"#
        );
        let mut cfg: ProjectConfig = serde_yaml::from_str(&yaml).unwrap();
        let _ = cfg.finalize();
        cfg
    }

    fn identity() -> Identity {
        Identity::new("u1", "ROLE_USER", "PRO")
    }

    #[test]
    fn hop_by_hop_and_identity_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.com"));
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("content-length", HeaderValue::from_static("4"));
        headers.insert("x-user-id", HeaderValue::from_static("spoofed"));
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let filtered = filter_headers(&headers);
        assert!(filtered.get("host").is_none());
        assert!(filtered.get("connection").is_none());
        assert!(filtered.get("content-length").is_none());
        assert!(filtered.get("x-user-id").is_none());
        assert!(filtered.get("authorization").is_some());
        assert!(filtered.get("accept").is_some());
    }

    #[tokio::test]
    async fn invalid_target_url_is_rejected_before_any_network_call() {
        let forwarder = Forwarder::new(None);
        let project = project("not a url");
        let outcome = forwarder
            .forward(
                http::Method::GET,
                "/shop/items",
                None,
                &HeaderMap::new(),
                Body::empty(),
                &project,
                &identity(),
            )
            .await;
        assert_eq!(outcome.unwrap_err(), ForwardError::InvalidUpstreamUri);
    }

    #[tokio::test]
    async fn unreachable_upstream_is_classified_as_unreachable() {
        let forwarder = Forwarder::new(None);
        // Nothing listens on this port; connection is refused immediately.
        let project = project("http://127.0.0.1:1");
        let outcome = forwarder
            .forward(
                http::Method::GET,
                "/shop/items",
                None,
                &HeaderMap::new(),
                Body::empty(),
                &project,
                &identity(),
            )
            .await;
        assert_eq!(outcome.unwrap_err(), ForwardError::Unreachable);
    }

    #[tokio::test]
    async fn global_timeout_applies_when_project_has_no_time_limiter() {
        let router = axum::Router::new().route(
            "/x",
            axum::routing::get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "ok"
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let forwarder = Forwarder::new(Some(Duration::from_millis(100)));
        let project = project(&format!("http://{addr}"));
        let outcome = forwarder
            .forward(
                http::Method::GET,
                "/shop/x",
                None,
                &HeaderMap::new(),
                Body::empty(),
                &project,
                &identity(),
            )
            .await;
        assert_eq!(outcome.unwrap_err(), ForwardError::Timeout);
    }
}
