use std::sync::Arc;

use ando_core::config::ProjectConfig;
use ando_core::identity::Identity;

use crate::kv::KvStore;

/// Distributed token-bucket decision per `(project, subject)` fingerprint
/// (C4). Fails open on store errors — the limiter is defence in depth, not
/// the only defence, and a store outage must not take the whole gateway
/// down (spec §4.3).
pub struct RateLimiter {
    store: Arc<dyn KvStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn is_allowed(
        &self,
        project: &ProjectConfig,
        identity: &Identity,
        client_ip: &str,
    ) -> bool {
        let Some(rl) = &project.rate_limit else {
            return true;
        };
        let key = rate_limit_key(&project.prefix, identity, client_ip);
        let ttl = ProjectConfig::rate_limit_ttl_secs(rl);

        match self
            .store
            .eval_rate_limit(&key, rl.capacity, rl.refill_rate, ttl)
            .await
        {
            Ok(decision) => decision.allowed,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "rate limiter store failure, failing open");
                true
            }
        }
    }
}

/// `rate_limit:<prefix>:user:<id>` when the identity is known and not the
/// anonymous sentinel, else `rate_limit:<prefix>:ip:<clientIp>` (spec §4.3).
fn rate_limit_key(prefix: &str, identity: &Identity, client_ip: &str) -> String {
    if identity.is_anonymous() {
        format!("rate_limit:{prefix}:ip:{client_ip}")
    } else {
        format!("rate_limit:{prefix}:user:{}", identity.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{RateLimitDecision, StoreError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    struct FakeStore {
        fail: bool,
        calls: Mutex<Vec<String>>,
        counter: AtomicU64,
        capacity: u64,
    }

    impl FakeStore {
        fn new(capacity: u64) -> Self {
            Self {
                fail: false,
                calls: Mutex::new(Vec::new()),
                counter: AtomicU64::new(0),
                capacity,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: Mutex::new(Vec::new()),
                counter: AtomicU64::new(0),
                capacity: 0,
            }
        }
    }

    #[async_trait]
    impl KvStore for FakeStore {
        async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }

        async fn eval_rate_limit(
            &self,
            key: &str,
            _capacity: u64,
            _refill_rate: f64,
            _ttl_secs: i64,
        ) -> Result<RateLimitDecision, StoreError> {
            if self.fail {
                return Err(StoreError::Connection("down".to_string()));
            }
            self.calls.lock().unwrap().push(key.to_string());
            let used = self.counter.fetch_add(1, Ordering::SeqCst);
            Ok(RateLimitDecision {
                allowed: used < self.capacity,
                remaining_tokens: self.capacity.saturating_sub(used + 1) as i64,
            })
        }
    }

    fn project_with_limit(capacity: u64) -> ProjectConfig {
        let yaml = format!(
            r#"
prefix: /api
target_url: http://localhost:9000
auth_type: TOKEN
rate_limit:
  capacity: {capacity}
  refill_rate: 0
"#
        );
        let mut cfg: ProjectConfig = serde_yaml::from_str(&yaml).unwrap();
        cfg.finalize().unwrap();
        cfg
    }

    #[tokio::test]
    async fn unset_rate_limit_always_allows() {
        let store = Arc::new(FakeStore::new(0));
        let limiter = RateLimiter::new(store);
        let yaml = r#"
prefix: /open
target_url: http://localhost:9000
auth_type: TOKEN
"#;
        let mut project: ProjectConfig = serde_yaml::from_str(yaml).unwrap();
        project.finalize().unwrap();
        let identity = Identity::anonymous();
        assert!(limiter.is_allowed(&project, &identity, "1.2.3.4").await);
    }

    #[tokio::test]
    async fn burst_beyond_capacity_is_rejected() {
        let store = Arc::new(FakeStore::new(3));
        let limiter = RateLimiter::new(store);
        let project = project_with_limit(3);
        let identity = Identity::new("u1", "ROLE_USER", "FREE");

        let mut allowed_count = 0;
        for _ in 0..5 {
            if limiter.is_allowed(&project, &identity, "1.2.3.4").await {
                allowed_count += 1;
            }
        }
        assert_eq!(allowed_count, 3);
    }

    #[tokio::test]
    async fn store_failure_fails_open() {
        let store = Arc::new(FakeStore::failing());
        let limiter = RateLimiter::new(store);
        let project = project_with_limit(1);
        let identity = Identity::new("u1", "ROLE_USER", "FREE");
        assert!(limiter.is_allowed(&project, &identity, "1.2.3.4").await);
    }

    #[test]
    fn key_uses_user_id_when_identified() {
        let id = Identity::new("u1", "ROLE_USER", "FREE");
        assert_eq!(rate_limit_key("/api", &id, "1.2.3.4"), "rate_limit:/api:user:u1");
    }

    #[test]
    fn key_falls_back_to_ip_for_anonymous() {
        let id = Identity::anonymous();
        assert_eq!(rate_limit_key("/api", &id, "1.2.3.4"), "rate_limit:/api:ip:1.2.3.4");
    }
}
