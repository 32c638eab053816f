use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::error::GatewayError;
use crate::glob::PathGlob;

/// Top-level configuration for the Ando gateway. Loaded once at startup
/// (`AndoConfig::load`) and never mutated afterwards. The `ProjectRegistry`
/// built from `projects` is held behind an `arc_swap::ArcSwap` by the
/// orchestrator so a future reload story is a pointer swap, not a
/// structural rewrite, even though per-route hot-reload in-flight is an
/// explicit Non-goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AndoConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    /// Named projects, keyed by an operator-facing name (the config surface
    /// of spec.md §6: `projects.<name>.{...}`). `ProjectConfig::prefix` is
    /// the value actually used for routing.
    #[serde(default)]
    pub projects: HashMap<String, ProjectConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,

    /// Global upper bound on an upstream call when a project doesn't set its
    /// own `timeLimiter`. `None` means no cap beyond the breaker's policy.
    #[serde(default)]
    pub global_timeout_ms: Option<u64>,

    /// TCP connect timeout, fixed at 3s per spec §4.5/§5 but left
    /// configurable for tests.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            admin_addr: default_admin_addr(),
            global_timeout_ms: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// CORS front filter policy (C9). Preflight mechanics are handled by
/// `tower_http::cors::CorsLayer`; this struct is just the operator-facing
/// policy it's built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_cors_methods")]
    pub allowed_methods: Vec<String>,

    #[serde(default = "default_cors_headers")]
    pub allowed_headers: Vec<String>,

    #[serde(default = "default_cors_exposed_headers")]
    pub exposed_headers: Vec<String>,

    #[serde(default = "default_true")]
    pub allow_credentials: bool,

    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_cors_origins(),
            allowed_methods: default_cors_methods(),
            allowed_headers: default_cors_headers(),
            exposed_headers: default_cors_exposed_headers(),
            allow_credentials: true,
            max_age_secs: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthType {
    Token,
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub capacity: u64,
    pub refill_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Percent, 0-100.
    pub failure_rate_threshold: u8,
    pub sliding_window_size: u32,
    pub wait_duration_ms: u64,
    pub half_open_permitted_calls: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeLimiterConfig {
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub cancel_running_future: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Non-empty URL path prefix, beginning with `/`. Also used as the
    /// circuit breaker's name.
    pub prefix: String,

    pub target_url: String,

    pub auth_type: AuthType,

    #[serde(default)]
    pub token_secret: Option<String>,

    #[serde(default)]
    pub token_public_key: Option<String>,

    #[serde(default)]
    pub token_cookie_name: Option<String>,

    #[serde(default = "default_session_cookie_name")]
    pub session_cookie_name: String,

    #[serde(default)]
    pub csrf_required: bool,

    #[serde(default)]
    pub public_paths: Vec<String>,

    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    #[serde(default)]
    pub circuit_breaker: Option<CircuitBreakerConfig>,

    #[serde(default)]
    pub time_limiter: Option<TimeLimiterConfig>,

    /// Compiled glob matchers for `public_paths`, built by `finalize()`.
    /// Not part of the wire format.
    #[serde(skip, default)]
    pub(crate) compiled_public_paths: Vec<PathGlob>,
}

impl ProjectConfig {
    /// Compile `public_paths` into matchers and validate invariants that
    /// can't be expressed through serde defaults. Called once at startup.
    pub fn finalize(&mut self) -> Result<(), GatewayError> {
        if !self.prefix.starts_with('/') || self.prefix.len() <= 1 {
            return Err(GatewayError::ConfigInvalid(format!(
                "project prefix must be non-empty and start with '/': {:?}",
                self.prefix
            )));
        }
        if self.target_url.trim().is_empty() {
            return Err(GatewayError::ConfigInvalid(format!(
                "project {} has an empty target_url",
                self.prefix
            )));
        }
        self.target_url
            .parse::<http::Uri>()
            .map_err(|e| GatewayError::ConfigInvalid(format!("invalid target_url: {e}")))?;
        if let Some(rl) = &self.rate_limit
            && (rl.capacity < 1 || rl.refill_rate < 0.0)
        {
            return Err(GatewayError::ConfigInvalid(format!(
                "project {} has an invalid rateLimit",
                self.prefix
            )));
        }
        if let Some(cb) = &self.circuit_breaker
            && (cb.failure_rate_threshold > 100
                || cb.sliding_window_size < 1
                || cb.half_open_permitted_calls < 1)
        {
            return Err(GatewayError::ConfigInvalid(format!(
                "project {} has an invalid circuitBreaker",
                self.prefix
            )));
        }

        self.compiled_public_paths = self
            .public_paths
            .iter()
            .map(|p| {
                PathGlob::new(p).map_err(|e| {
                    GatewayError::ConfigInvalid(format!("invalid publicPaths glob {p:?}: {e}"))
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Whether `path` matches one of this project's `publicPaths` globs.
    pub fn is_public_path(&self, path: &str) -> bool {
        self.compiled_public_paths.iter().any(|g| g.matches(path))
    }

    /// The rate-limit TTL per spec §3: `ceil(capacity/refillRate*2)` seconds,
    /// or 60s if `refillRate = 0`.
    pub fn rate_limit_ttl_secs(rl: &RateLimitConfig) -> i64 {
        if rl.refill_rate == 0.0 {
            60
        } else {
            ((rl.capacity as f64 / rl.refill_rate) * 2.0).ceil() as i64
        }
    }
}

impl AndoConfig {
    /// Load configuration from a YAML file plus environment overlay
    /// (`ANDO_` prefixed variables), following the teacher's
    /// figment-based loader.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["ando.yaml", "/etc/ando/ando.yaml", "config/ando.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }
        figment = figment.merge(Env::prefixed("ANDO_").split("__"));

        let mut config: AndoConfig = figment.extract()?;
        config.finalize()?;
        Ok(config)
    }

    /// Validate cross-project invariants and compile per-project matchers.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        let mut seen_prefixes: Vec<&str> = Vec::with_capacity(self.projects.len());
        for project in self.projects.values_mut() {
            project.finalize()?;
            if seen_prefixes.contains(&project.prefix.as_str()) {
                return Err(GatewayError::ConfigInvalid(format!(
                    "duplicate project prefix: {}",
                    project.prefix
                ))
                .into());
            }
            seen_prefixes.push(project.prefix.as_str());
        }
        Ok(())
    }
}

impl Default for AndoConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            gateway: GatewayConfig::default(),
            redis: RedisConfig::default(),
            cors: CorsConfig::default(),
            projects: HashMap::new(),
        }
    }
}

fn default_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
fn default_http_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}
fn default_admin_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().unwrap()
}
fn default_connect_timeout_ms() -> u64 {
    3_000
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_session_cookie_name() -> String {
    "SESSION".to_string()
}
fn default_true() -> bool {
    true
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}
fn default_cors_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "PATCH", "OPTIONS"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_cors_headers() -> Vec<String> {
    [
        "Authorization",
        "Content-Type",
        "X-XSRF-TOKEN",
        "Accept",
        "Origin",
        "X-Requested-With",
        "X-User-Id",
        "X-User-Role",
        "X-User-Plan",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_cors_exposed_headers() -> Vec<String> {
    ["X-User-Id", "X-User-Role", "X-User-Plan"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_cors_max_age() -> u64 {
    3600
}
