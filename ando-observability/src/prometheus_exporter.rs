use crate::metrics::GatewayMetrics;

/// Prometheus exposition endpoint handler, returns the text format for
/// scraping by `GET /metrics`.
pub fn render_metrics(metrics: &GatewayMetrics) -> String {
    metrics.gather_text()
}
