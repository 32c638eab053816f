use thiserror::Error;

/// Closed set of terminal outcomes the orchestrator can produce. Each
/// variant maps to exactly one HTTP status code (spec §6/§7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("no project configured for this path")]
    Routing,

    #[error("missing or blank X-XSRF-TOKEN header")]
    CsrfMissing,

    #[error("authentication required")]
    AuthMissing,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("circuit breaker is open")]
    BreakerOpen,

    #[error("upstream did not respond in time")]
    UpstreamTimeout,

    #[error("could not connect to the upstream service")]
    UpstreamUnreachable,

    #[error("gateway misconfiguration: {0}")]
    ConfigInvalid(String),

    #[error("an unexpected error occurred")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status code this outcome is surfaced as.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Routing => 404,
            GatewayError::CsrfMissing => 403,
            GatewayError::AuthMissing => 401,
            GatewayError::RateLimited => 429,
            GatewayError::BreakerOpen => 503,
            GatewayError::UpstreamTimeout => 504,
            GatewayError::UpstreamUnreachable => 502,
            GatewayError::ConfigInvalid(_) => 500,
            GatewayError::Internal(_) => 500,
        }
    }

    /// Reason phrase for the `error` field of the envelope.
    pub fn reason_phrase(&self) -> &'static str {
        match self.status_code() {
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            429 => "Too Many Requests",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => "Internal Server Error",
        }
    }

    /// Human-readable `message` field, per spec §4.7's classification table.
    pub fn message(&self) -> String {
        match self {
            GatewayError::Routing => "No project is configured for this path.".to_string(),
            GatewayError::CsrfMissing => {
                "Missing or blank X-XSRF-TOKEN header for a write request.".to_string()
            }
            GatewayError::AuthMissing => "Authentication is required for this path.".to_string(),
            GatewayError::RateLimited => "Rate limit exceeded. Please slow down.".to_string(),
            GatewayError::BreakerOpen => {
                "Service is temporarily unavailable. Circuit breaker is open.".to_string()
            }
            GatewayError::UpstreamTimeout => {
                "The upstream service did not respond in time. Please retry.".to_string()
            }
            GatewayError::UpstreamUnreachable => {
                "Could not connect to the upstream service.".to_string()
            }
            GatewayError::ConfigInvalid(detail) => format!("Gateway misconfiguration: {detail}"),
            GatewayError::Internal(_) => "An unexpected error occurred.".to_string(),
        }
    }
}
