use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Gateway-level Prometheus metrics (AMBIENT-METRICS). Built once at startup
/// and shared across every request; `/metrics` reads from this, nothing else
/// writes its own registry.
pub struct GatewayMetrics {
    registry: Registry,

    /// Total requests by project prefix, method and status class (e.g. "2xx").
    pub requests_total: IntCounterVec,

    /// End-to-end request latency by project prefix.
    pub request_duration: HistogramVec,

    /// Current circuit breaker state per project (0=closed, 1=half_open, 2=open).
    pub breaker_state: IntGaugeVec,

    /// Requests rejected by the rate limiter, by project.
    pub rate_limited_total: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("ando_requests_total", "Total gateway requests").namespace("ando"),
            &["project", "method", "status_class"],
        )?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new("ando_request_duration_seconds", "Request latency")
                .namespace("ando")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            &["project"],
        )?;

        let breaker_state = IntGaugeVec::new(
            Opts::new("ando_breaker_state", "Circuit breaker state (0=closed,1=half_open,2=open)")
                .namespace("ando"),
            &["project"],
        )?;

        let rate_limited_total = IntCounterVec::new(
            Opts::new("ando_rate_limited_total", "Requests rejected by the rate limiter")
                .namespace("ando"),
            &["project"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;
        registry.register(Box::new(breaker_state.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            breaker_state,
            rate_limited_total,
        })
    }

    /// Record a completed request (any terminal outcome, gateway- or
    /// upstream-produced).
    pub fn record_request(&self, project: &str, method: &str, status: u16, duration_secs: f64) {
        let status_class = format!("{}xx", status / 100);
        self.requests_total
            .with_label_values(&[project, method, &status_class])
            .inc();
        self.request_duration
            .with_label_values(&[project])
            .observe(duration_secs);
    }

    pub fn record_rate_limited(&self, project: &str) {
        self.rate_limited_total.with_label_values(&[project]).inc();
    }

    pub fn set_breaker_state(&self, project: &str, state_code: i64) {
        self.breaker_state.with_label_values(&[project]).set(state_code);
    }

    /// Prometheus text exposition for the `/metrics` endpoint.
    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for GatewayMetrics {
    fn default() -> Self {
        Self::new().expect("static metric definitions never fail to register")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_request("/shop", "GET", 200, 0.01);
        let text = metrics.gather_text();
        assert!(text.contains("ando_requests_total"));
        assert!(text.contains("status_class=\"2xx\""));
    }

    #[test]
    fn rate_limited_counter_is_exposed() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.record_rate_limited("/api");
        let text = metrics.gather_text();
        assert!(text.contains("ando_rate_limited_total"));
    }

    #[test]
    fn breaker_gauge_reflects_last_set_value() {
        let metrics = GatewayMetrics::new().unwrap();
        metrics.set_breaker_state("/svc", 2);
        let text = metrics.gather_text();
        assert!(text.contains("ando_breaker_state"));
    }
}
