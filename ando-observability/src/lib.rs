pub mod access_log;
pub mod metrics;
pub mod prometheus_exporter;

pub use access_log::{record as record_access_log, AccessLogEntry};
pub use metrics::GatewayMetrics;
