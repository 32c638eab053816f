pub mod breaker;
pub mod forwarder;

pub use breaker::{Breaker, BreakerPool, BreakerState, CallDecision};
pub use forwarder::{ForwardOutcome, Forwarder};
