use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use ando_core::config::CircuitBreakerConfig;
use dashmap::DashMap;
use std::sync::Arc;

/// Per-project circuit breaker state (C5, spec §4.4). Count-based sliding
/// window over the last `slidingWindowSize` terminal outcomes; once the
/// window is full and the failure rate reaches `failureRateThreshold`, the
/// breaker opens for `waitDurationMs` before admitting a bounded number of
/// half-open trial calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    Permitted,
    Rejected,
}

struct Inner {
    state: BreakerState,
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_in_flight: u32,
    half_open_completed: VecDeque<bool>,
}

pub struct Breaker {
    cfg: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl Breaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                half_open_in_flight: 0,
                half_open_completed: VecDeque::new(),
            }),
        }
    }

    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_expire_open(&mut inner);
        inner.state
    }

    /// Whether a call may proceed to the upstream right now. Admits a bounded
    /// number of concurrent trial calls while half-open rather than letting
    /// every in-flight request through at once.
    pub fn try_acquire(&self) -> CallDecision {
        let mut inner = self.inner.lock().unwrap();
        self.maybe_expire_open(&mut inner);
        match inner.state {
            BreakerState::Closed => CallDecision::Permitted,
            BreakerState::Open => CallDecision::Rejected,
            BreakerState::HalfOpen => {
                admit_half_open(&mut inner, self.cfg.half_open_permitted_calls)
            }
        }
    }

    /// Record the terminal outcome of a call that `try_acquire` admitted.
    pub fn record(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            BreakerState::Closed => {
                push_bounded(&mut inner.window, success, self.cfg.sliding_window_size as usize);
                if inner.window.len() == self.cfg.sliding_window_size as usize
                    && failure_rate(&inner.window) >= self.cfg.failure_rate_threshold
                {
                    self.trip_open(&mut inner);
                }
            }
            BreakerState::HalfOpen => {
                inner.half_open_in_flight = inner.half_open_in_flight.saturating_sub(1);
                inner.half_open_completed.push_back(success);
                if inner.half_open_completed.len() as u32 >= self.cfg.half_open_permitted_calls {
                    if failure_rate(&inner.half_open_completed) >= self.cfg.failure_rate_threshold {
                        self.trip_open(&mut inner);
                    } else {
                        inner.state = BreakerState::Closed;
                        inner.window.clear();
                    }
                    inner.half_open_completed.clear();
                }
            }
            BreakerState::Open => {}
        }
    }

    fn trip_open(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.opened_at = Some(Instant::now());
        inner.window.clear();
    }

    fn maybe_expire_open(&self, inner: &mut Inner) {
        if inner.state != BreakerState::Open {
            return;
        }
        let Some(opened_at) = inner.opened_at else {
            return;
        };
        if opened_at.elapsed() >= Duration::from_millis(self.cfg.wait_duration_ms) {
            inner.state = BreakerState::HalfOpen;
            inner.half_open_in_flight = 0;
            inner.half_open_completed.clear();
        }
    }
}

fn admit_half_open(inner: &mut Inner, permitted: u32) -> CallDecision {
    if inner.half_open_in_flight < permitted {
        inner.half_open_in_flight += 1;
        CallDecision::Permitted
    } else {
        CallDecision::Rejected
    }
}

fn push_bounded(window: &mut VecDeque<bool>, value: bool, max: usize) {
    if window.len() >= max {
        window.pop_front();
    }
    window.push_back(value);
}

fn failure_rate(window: &VecDeque<bool>) -> u8 {
    if window.is_empty() {
        return 0;
    }
    let failures = window.iter().filter(|ok| !**ok).count();
    ((failures * 100) / window.len()) as u8
}

/// One breaker per project prefix, created lazily on first use.
pub struct BreakerPool {
    breakers: DashMap<String, Arc<Breaker>>,
}

impl BreakerPool {
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    pub fn get_or_create(&self, prefix: &str, cfg: &CircuitBreakerConfig) -> Arc<Breaker> {
        self.breakers
            .entry(prefix.to_string())
            .or_insert_with(|| Arc::new(Breaker::new(cfg.clone())))
            .clone()
    }
}

impl Default for BreakerPool {
    fn default() -> Self {
        Self::new()
    }
}
