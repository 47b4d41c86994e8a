//! Metrics & structured request logging (C11).
//!
//! Mirrors the reference implementation's `server/metrics.go` (per-listener request latency,
//! connection gauges) and `logger/logger.go`'s `LogRequest` (one structured log line per
//! handled request, built up from fields attached along the way). The reference's zap fields
//! become `tracing` fields; its `prometheus.Summary` becomes a `Histogram`, since the
//! `prometheus` crate has no direct client-side-quantile summary type. Two gauges have no
//! reference-implementation counterpart (`engine_queue_depth`, `engine_instances_busy`): the
//! reference only exposes fasthttp-level concurrency, not per-engine queue state, which this
//! worker-pool architecture can usefully expose since it is the thing most likely to explain a
//! slow or 503'd request.

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::error::{CoreError, Result};

pub const NAMESPACE: &str = "pkimetal";

/// Which of the two listeners (web vs. monitoring) a metric applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Monitoring,
    Linting,
}

impl RequestKind {
    fn label(self) -> &'static str {
        match self {
            RequestKind::Monitoring => "monitoring",
            RequestKind::Linting => "linting",
        }
    }
}

fn metrics_err(e: prometheus::Error) -> CoreError {
    CoreError::Metrics(e.to_string())
}

/// Every Prometheus metric the service exposes at `/metrics`, registered once at boot.
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration_seconds: HistogramVec,
    open_connections: IntGaugeVec,
    engine_queue_depth: IntGaugeVec,
    engine_instances_busy: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("requests_total", "Total number of requests handled.").namespace(NAMESPACE),
            &["listener"],
        )
        .map_err(metrics_err)?;
        registry.register(Box::new(requests_total.clone())).map_err(metrics_err)?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Number of seconds to handle a request.")
                .namespace(NAMESPACE),
            &["listener"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .map_err(metrics_err)?;

        let open_connections = IntGaugeVec::new(
            Opts::new("open_connections", "Number of currently open HTTP connections.").namespace(NAMESPACE),
            &["listener"],
        )
        .map_err(metrics_err)?;
        registry.register(Box::new(open_connections.clone())).map_err(metrics_err)?;

        let engine_queue_depth = IntGaugeVec::new(
            Opts::new("engine_queue_depth", "Requests currently queued for an engine.").namespace(NAMESPACE),
            &["engine"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(engine_queue_depth.clone()))
            .map_err(metrics_err)?;

        let engine_instances_busy = IntGaugeVec::new(
            Opts::new(
                "engine_instances_busy",
                "Engine instances currently handling a request.",
            )
            .namespace(NAMESPACE),
            &["engine"],
        )
        .map_err(metrics_err)?;
        registry
            .register(Box::new(engine_instances_busy.clone()))
            .map_err(metrics_err)?;

        Ok(Self {
            registry,
            requests_total,
            request_duration_seconds,
            open_connections,
            engine_queue_depth,
            engine_instances_busy,
        })
    }

    pub fn record_request(&self, listener: RequestKind, elapsed: Duration) {
        self.requests_total.with_label_values(&[listener.label()]).inc();
        self.request_duration_seconds
            .with_label_values(&[listener.label()])
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_open_connections(&self, listener: RequestKind, value: i64) {
        self.open_connections.with_label_values(&[listener.label()]).set(value);
    }

    pub fn set_engine_queue_depth(&self, engine: &str, value: i64) {
        self.engine_queue_depth.with_label_values(&[engine]).set(value);
    }

    pub fn set_engine_instances_busy(&self, engine: &str, value: i64) {
        self.engine_instances_busy.with_label_values(&[engine]).set(value);
    }

    /// Renders every registered metric in the Prometheus text exposition format, for `/metrics`.
    pub fn encode(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(metrics_err)?;
        String::from_utf8(buf).map_err(|e| CoreError::Metrics(e.to_string()))
    }
}

/// The fields one handled HTTP request contributes to its log line, gathered by the HTTP
/// surface as the request is processed and emitted once at the end, same as the reference
/// implementation accumulating `fhctx.UserValue`s across a request and writing them out in
/// `LogRequest`.
pub struct RequestLogFields<'a> {
    pub client_ip: String,
    pub method: &'a str,
    pub path: &'a str,
    pub http_status: u16,
    pub response_body_size: usize,
    pub time_taken: Duration,
    pub request_content_type: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub error: Option<&'a str>,
}

/// Log levels used by `log_request`, mirroring the reference's `zapcore.Level` values that
/// `SetDetails` stores per-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Emits one structured log line for a handled request.
pub fn log_request(level: LogLevel, msg: &str, fields: &RequestLogFields<'_>) {
    let f = fields;
    match level {
        LogLevel::Debug => tracing::debug!(
            client_ip = %f.client_ip,
            http_method = f.method,
            http_status = f.http_status,
            raw_path = f.path,
            response_body_size = f.response_body_size,
            time_taken_ns = f.time_taken.as_nanos() as u64,
            request_content_type = f.request_content_type,
            user_agent = f.user_agent,
            error = f.error,
            "{msg}"
        ),
        LogLevel::Info => tracing::info!(
            client_ip = %f.client_ip,
            http_method = f.method,
            http_status = f.http_status,
            raw_path = f.path,
            response_body_size = f.response_body_size,
            time_taken_ns = f.time_taken.as_nanos() as u64,
            request_content_type = f.request_content_type,
            user_agent = f.user_agent,
            error = f.error,
            "{msg}"
        ),
        LogLevel::Warn => tracing::warn!(
            client_ip = %f.client_ip,
            http_method = f.method,
            http_status = f.http_status,
            raw_path = f.path,
            response_body_size = f.response_body_size,
            time_taken_ns = f.time_taken.as_nanos() as u64,
            request_content_type = f.request_content_type,
            user_agent = f.user_agent,
            error = f.error,
            "{msg}"
        ),
        LogLevel::Error => tracing::error!(
            client_ip = %f.client_ip,
            http_method = f.method,
            http_status = f.http_status,
            raw_path = f.path,
            response_body_size = f.response_body_size,
            time_taken_ns = f.time_taken.as_nanos() as u64,
            request_content_type = f.request_content_type,
            user_agent = f.user_agent,
            error = f.error,
            "{msg}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_registers_both_listeners_without_name_collision() {
        let metrics = Metrics::new().expect("metric registration should not collide");
        metrics.record_request(RequestKind::Linting, Duration::from_millis(5));
        metrics.record_request(RequestKind::Monitoring, Duration::from_micros(200));
        metrics.set_open_connections(RequestKind::Linting, 3);
        metrics.set_engine_queue_depth("zlint", 7);
        metrics.set_engine_instances_busy("zlint", 1);

        let text = metrics.encode().unwrap();
        assert!(text.contains("pkimetal_requests_total"));
        assert!(text.contains("listener=\"linting\""));
        assert!(text.contains("listener=\"monitoring\""));
        assert!(text.contains("pkimetal_request_duration_seconds"));
        assert!(text.contains("pkimetal_open_connections"));
        assert!(text.contains("pkimetal_engine_queue_depth"));
        assert!(text.contains("engine=\"zlint\""));
        assert!(text.contains("pkimetal_engine_instances_busy"));
    }

    #[test]
    fn log_request_does_not_panic_with_missing_optional_fields() {
        let fields = RequestLogFields {
            client_ip: "127.0.0.1".to_string(),
            method: "POST",
            path: "/lintcert",
            http_status: 200,
            response_body_size: 42,
            time_taken: Duration::from_millis(7),
            request_content_type: None,
            user_agent: None,
            error: None,
        };
        log_request(LogLevel::Info, "Linting Request", &fields);
    }
}
