use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use redis::{AsyncCommands, Script};

use crate::kv::{KvStore, RateLimitDecision, StoreError};

/// Token-bucket rate limiter, implemented as a single atomic `EVAL` so
/// concurrent gateway instances share state without a distributed lock
/// (spec §4.3, §9 "server-side script"). Reads time from `redis.call('TIME')`
/// — never from the caller — so clock drift between gateway nodes can't be
/// used to burst past `capacity`.
const RATE_LIMIT_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local requested = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local time_parts = redis.call('TIME')
local now = tonumber(time_parts[1])

local state = redis.call('HMGET', key, 'tokens', 'last_refilled')
local tokens = tonumber(state[1])
local last_refilled = tonumber(state[2])

if tokens == nil then
  tokens = capacity
  last_refilled = now
end

local delta = now - last_refilled
if delta < 0 then
  delta = 0
end
local refilled = math.min(capacity, tokens + delta * refill_rate)
if refilled > tokens then
  last_refilled = now
end
tokens = refilled

local allowed = 0
if tokens >= requested then
  tokens = tokens - requested
  allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refilled', last_refilled)
redis.call('EXPIRE', key, ttl)

return {allowed, math.floor(tokens)}
"#;

pub struct RedisStore {
    pool: Pool,
    script: Script,
}

impl RedisStore {
    pub fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let cfg = Config::from_url(redis_url);
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self {
            pool,
            script: Script::new(RATE_LIMIT_SCRIPT),
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(exists)
    }

    async fn eval_rate_limit(
        &self,
        key: &str,
        capacity: u64,
        refill_rate: f64,
        ttl_secs: i64,
    ) -> Result<RateLimitDecision, StoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let (allowed, remaining): (i64, i64) = self
            .script
            .key(key)
            .arg(capacity)
            .arg(refill_rate)
            .arg(1)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| StoreError::Script(e.to_string()))?;

        Ok(RateLimitDecision {
            allowed: allowed == 1,
            remaining_tokens: remaining,
        })
    }
}
