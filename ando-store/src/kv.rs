use async_trait::async_trait;
use thiserror::Error;

/// The only contract the gateway needs from its backing key-value store
/// (spec §1/§6): test key existence, and evaluate an atomic server-side
/// script with keys and an argument list.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// `EXISTS <key>` — used for session lookup.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Evaluate the rate-limit token-bucket script against `key`, using
    /// server-side time. Never pass a client-side timestamp (spec §4.3,
    /// §9 Open Question 1) — clock drift between gateway nodes would allow
    /// bursting past `capacity`.
    async fn eval_rate_limit(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        ttl_secs: i64,
    ) -> Result<RateLimitDecision, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining_tokens: i64,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key-value store connection error: {0}")]
    Connection(String),

    #[error("key-value store script error: {0}")]
    Script(String),
}
