pub mod kv;
pub mod ratelimit;
pub mod redis_store;

pub use kv::{KvStore, RateLimitDecision, StoreError};
pub use ratelimit::RateLimiter;
pub use redis_store::RedisStore;
