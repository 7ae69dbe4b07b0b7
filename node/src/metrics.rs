//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] under
//! the `trustline` prefix so they do not collide with any default global
//! registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// Prometheus handles are reference-counted internally, so cloning is cheap.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Prometheus registry that owns all metrics below.
    registry: Registry,
    /// Lines opened (including re-opened after a close).
    pub lines_created_total: IntCounter,
    /// Lines closed.
    pub lines_closed_total: IntCounter,
    /// Lines currently open.
    pub active_lines: IntGauge,
    /// Payments netted into a balance.
    pub payments_accepted_total: IntCounter,
    /// Payments refused, labelled by error code.
    pub payments_rejected_total: IntCounterVec,
    /// Successful limit changes.
    pub limit_updates_total: IntCounter,
    /// Request handling latency per ledger operation, in seconds.
    pub operation_latency_seconds: HistogramVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("trustline".into()), None)?;

        let lines_created_total =
            IntCounter::new("lines_created_total", "Total number of credit lines opened")?;
        registry.register(Box::new(lines_created_total.clone()))?;

        let lines_closed_total =
            IntCounter::new("lines_closed_total", "Total number of credit lines closed")?;
        registry.register(Box::new(lines_closed_total.clone()))?;

        let active_lines = IntGauge::new("active_lines", "Number of currently open credit lines")?;
        registry.register(Box::new(active_lines.clone()))?;

        let payments_accepted_total = IntCounter::new(
            "payments_accepted_total",
            "Total number of payments netted into a credit line",
        )?;
        registry.register(Box::new(payments_accepted_total.clone()))?;

        let payments_rejected_total = IntCounterVec::new(
            Opts::new(
                "payments_rejected_total",
                "Total number of rejected payments by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(payments_rejected_total.clone()))?;

        let limit_updates_total =
            IntCounter::new("limit_updates_total", "Total number of credit limit changes")?;
        registry.register(Box::new(limit_updates_total.clone()))?;

        let operation_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Ledger operation latency in seconds",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            lines_created_total,
            lines_closed_total,
            active_lines,
            payments_accepted_total,
            payments_rejected_total,
            limit_updates_total,
            operation_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
