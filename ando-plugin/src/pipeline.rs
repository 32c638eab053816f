//! C7 — the pipeline orchestrator (spec §4.6).
//!
//! Fixed stage order per request: Resolve → CSRF → Authenticate → Rate
//! limit → Breaker(Proxy). Each stage either continues or short-circuits
//! with a classified [`GatewayError`], which the caller renders through
//! [`crate::envelope::write`]. Nothing is retried; the limiter's store
//! failure is the sole fail-open case (handled inside `ando_store`).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use ando_core::config::{AuthType, ProjectConfig};
use ando_core::error::GatewayError;
use ando_core::identity::Identity;
use ando_core::registry::ProjectRegistry;
use ando_observability::{record_access_log, AccessLogEntry, GatewayMetrics};
use ando_plugins::auth::{session, token, AuthOutcome};
use ando_plugins::traffic::csrf;
use ando_proxy::breaker::{BreakerPool, BreakerState, CallDecision};
use ando_proxy::forwarder::{ForwardError, Forwarder};
use ando_store::{KvStore, RateLimiter};
use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::response::Response;
use http::Request;

use crate::context;
use crate::envelope;

/// Collaborators the orchestrator is constructed with — explicit dependency
/// injection (spec §9), no process-wide singletons beyond the registry
/// snapshot and the breaker pool itself. The registry sits behind an
/// `ArcSwap` so a future config-reload story is a pointer swap, not a
/// structural rewrite, even though per-route hot-reload in-flight stays a
/// Non-goal today.
pub struct Orchestrator {
    registry: Arc<ArcSwap<ProjectRegistry>>,
    store: Arc<dyn KvStore>,
    rate_limiter: Arc<RateLimiter>,
    breakers: Arc<BreakerPool>,
    forwarder: Arc<Forwarder>,
    metrics: Arc<GatewayMetrics>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProjectRegistry>,
        store: Arc<dyn KvStore>,
        rate_limiter: Arc<RateLimiter>,
        breakers: Arc<BreakerPool>,
        forwarder: Arc<Forwarder>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry: Arc::new(ArcSwap::from(registry)),
            store,
            rate_limiter,
            breakers,
            forwarder,
            metrics,
        }
    }

    /// Run the full pipeline for one inbound request and render either the
    /// proxied upstream response or a §4.7 error envelope.
    pub async fn handle(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0);

        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_string();
        let raw_query = parts.uri.query().map(str::to_string);
        let method = parts.method.clone();
        let client_ip = context::client_ip(&parts.headers, remote_addr);
        let request_id = context::request_id(&parts.headers);

        let outcome = self
            .run_stages(&method, &path, raw_query.as_deref(), &parts.headers, body, &client_ip)
            .await;

        let (response, project_label, status) = match outcome {
            Ok((response, project_label, status)) => (response, project_label, status),
            Err((err, project_label)) => (envelope::write(&err, &path), project_label, err.status_code()),
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.metrics
            .record_request(&project_label, method.as_str(), status, latency_ms / 1000.0);
        record_access_log(&AccessLogEntry {
            project: project_label,
            method: method.to_string(),
            path,
            status,
            latency_ms,
            client_ip,
            request_id,
        });

        response
    }

    /// Returns `Ok((response, project_prefix, status))` on a proxied
    /// outcome, `Err((classified_error, project_prefix))` on any
    /// short-circuit. `project_prefix` is `"-"` when resolution itself
    /// failed, for metrics/logging labels.
    async fn run_stages(
        &self,
        method: &http::Method,
        path: &str,
        raw_query: Option<&str>,
        headers: &http::HeaderMap,
        body: Body,
        client_ip: &str,
    ) -> Result<(Response, String, u16), (GatewayError, String)> {
        // 1. Resolve
        let project = self
            .registry
            .load()
            .resolve(path)
            .ok_or((GatewayError::Routing, "-".to_string()))?;
        let label = project.prefix.clone();

        // 2. CSRF
        if !csrf::passes(method, headers, &project) {
            return Err((GatewayError::CsrfMissing, label));
        }

        // 3. Authenticate
        let auth_outcome = self.authenticate(headers, &project).await;
        let identity = match auth_outcome {
            AuthOutcome::Identity(identity) => identity,
            AuthOutcome::Absent if project.is_public_path(path) => Identity::anonymous(),
            AuthOutcome::Absent => return Err((GatewayError::AuthMissing, label)),
        };

        // 4. Rate limit
        if !self
            .rate_limiter
            .is_allowed(&project, &identity, client_ip)
            .await
        {
            self.metrics.record_rate_limited(&label);
            return Err((GatewayError::RateLimited, label));
        }

        // 5. Breaker(Proxy)
        let breaker = project
            .circuit_breaker
            .as_ref()
            .map(|cfg| self.breakers.get_or_create(&project.prefix, cfg));

        if let Some(breaker) = &breaker {
            if breaker.try_acquire() == CallDecision::Rejected {
                self.metrics.set_breaker_state(&label, breaker_state_code(breaker.state()));
                return Err((GatewayError::BreakerOpen, label));
            }
        }

        let forward_result = self
            .forwarder
            .forward(method.clone(), path, raw_query, headers, body, &project, &identity)
            .await;

        match forward_result {
            Ok(outcome) => {
                if let Some(breaker) = &breaker {
                    breaker.record(!outcome.is_upstream_failure);
                    self.metrics.set_breaker_state(&label, breaker_state_code(breaker.state()));
                }
                let status = outcome.response.status().as_u16();
                Ok((outcome.response, label, status))
            }
            Err(err) => {
                if let Some(breaker) = &breaker {
                    breaker.record(false);
                    self.metrics.set_breaker_state(&label, breaker_state_code(breaker.state()));
                }
                let classified = match err {
                    ForwardError::InvalidUpstreamUri => {
                        GatewayError::Internal("invalid upstream URI".to_string())
                    }
                    ForwardError::Timeout => GatewayError::UpstreamTimeout,
                    ForwardError::Unreachable => GatewayError::UpstreamUnreachable,
                };
                Err((classified, label))
            }
        }
    }

    async fn authenticate(&self, headers: &http::HeaderMap, project: &ProjectConfig) -> AuthOutcome {
        match project.auth_type {
            AuthType::Token => token::authenticate(headers, project),
            AuthType::Session => session::authenticate(headers, project, self.store.as_ref()).await,
        }
    }
}

/// Gauge encoding for `ando_breaker_state` (0=closed,1=half_open,2=open),
/// matching the metric's own documented scale.
fn breaker_state_code(state: BreakerState) -> i64 {
    match state {
        BreakerState::Closed => 0,
        BreakerState::HalfOpen => 1,
        BreakerState::Open => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ando_core::config::ProjectConfig;
    use ando_store::{RateLimitDecision, StoreError};
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use http::{HeaderMap, Method};

    struct FakeStore;

    #[async_trait]
    impl KvStore for FakeStore {
        async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn eval_rate_limit(
            &self,
            _key: &str,
            _capacity: u64,
            _refill_rate: f64,
            _ttl_secs: i64,
        ) -> Result<RateLimitDecision, StoreError> {
            Ok(RateLimitDecision {
                allowed: true,
                remaining_tokens: 0,
            })
        }
    }

    fn project(yaml: &str) -> ProjectConfig {
        let mut cfg: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        cfg.finalize().unwrap();
        cfg
    }

    fn orchestrator(registry: ProjectRegistry) -> Orchestrator {
        let store: Arc<dyn KvStore> = Arc::new(FakeStore);
        Orchestrator::new(
            Arc::new(registry),
            Arc::clone(&store),
            Arc::new(RateLimiter::new(store)),
            Arc::new(BreakerPool::new()),
            Arc::new(Forwarder::new(None)),
            Arc::new(GatewayMetrics::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn unknown_prefix_yields_404_envelope() {
        let orch = orchestrator(ProjectRegistry::new(vec![]));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/nowhere")
            .body(Body::empty())
            .unwrap();
        let response = orch.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["path"], "/nowhere");
    }

    #[tokio::test]
    async fn missing_auth_on_protected_path_yields_401() {
        let p = project(
            r#"
prefix: /shop
target_url: http://127.0.0.1:1
auth_type: TOKEN
token_secret: c2VjcmV0
"#,
        );
        let orch = orchestrator(ProjectRegistry::new(vec![p]));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/shop/items")
            .body(Body::empty())
            .unwrap();
        let response = orch.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn public_path_admits_anonymous_identity() {
        let p = project(
            r#"
prefix: /shop
target_url: http://127.0.0.1:1
auth_type: TOKEN
token_secret: c2VjcmV0
public_paths:
  - /shop/health
"#,
        );
        let orch = orchestrator(ProjectRegistry::new(vec![p]));
        let req = Request::builder()
            .method(Method::GET)
            .uri("/shop/health")
            .body(Body::empty())
            .unwrap();
        // Unreachable upstream -> 502, but it must get *past* authentication,
        // i.e. not 401.
        let response = orch.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn csrf_required_post_without_header_yields_403() {
        let p = project(
            r#"
prefix: /secure
target_url: http://127.0.0.1:1
auth_type: SESSION
csrf_required: true
"#,
        );
        let orch = orchestrator(ProjectRegistry::new(vec![p]));
        let req = Request::builder()
            .method(Method::POST)
            .uri("/secure/x")
            .body(Body::empty())
            .unwrap();
        let response = orch.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn csrf_check_runs_before_authentication() {
        // No session cookie either, but CSRF must fail first (403, not 401).
        let p = project(
            r#"
prefix: /secure
target_url: http://127.0.0.1:1
auth_type: SESSION
csrf_required: true
"#,
        );
        let orch = orchestrator(ProjectRegistry::new(vec![p]));
        let mut headers = HeaderMap::new();
        headers.insert("x-xsrf-token", "   ".parse().unwrap());
        let req = Request::builder()
            .method(Method::POST)
            .uri("/secure/x")
            .body(Body::empty())
            .unwrap();
        let response = orch.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
    }
}
