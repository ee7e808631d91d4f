//! Observability module for arbiter.
//!
//! Provides logging and Prometheus metrics.

use crate::config::ObservabilityConfig;
use crate::error::{ArbiterError, Result};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| ArbiterError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| ArbiterError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!("Observability initialized");
    Ok(())
}

/// Run the Prometheus metrics server.
pub async fn run_metrics_server(config: ObservabilityConfig) -> Result<()> {
    let builder = PrometheusBuilder::new();

    let handle = builder
        .install_recorder()
        .map_err(|e| ArbiterError::Internal(format!("Failed to install metrics recorder: {}", e)))?;

    register_metrics();

    let app = axum::Router::new()
        .route(
            "/metrics",
            axum::routing::get(move || async move { handle.render() }),
        )
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind(config.metrics_addr).await?;
    info!(addr = %config.metrics_addr, "Metrics server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| ArbiterError::Network(e.to_string()))?;

    Ok(())
}

/// Register standard metrics.
fn register_metrics() {
    // Routing metrics
    counter!("arbiter_predict_requests_total").absolute(0);
    counter!("arbiter_predict_errors_total").absolute(0);

    // Ledger metrics
    counter!("arbiter_status_changes_total").absolute(0);

    // A/B test metrics
    counter!("arbiter_ab_tests_started_total").absolute(0);
    counter!("arbiter_ab_tests_finished_total").absolute(0);
}

/// Record a routed prediction request.
pub fn record_route(endpoint: &str, error: bool) {
    counter!("arbiter_predict_requests_total", "endpoint" => endpoint.to_string()).increment(1);
    if error {
        counter!("arbiter_predict_errors_total", "endpoint" => endpoint.to_string()).increment(1);
    }
}

/// Record a status-ledger change.
pub fn record_status_change(status: &str) {
    counter!("arbiter_status_changes_total", "status" => status.to_string()).increment(1);
}

/// Record an A/B test start.
pub fn record_ab_test_started() {
    counter!("arbiter_ab_tests_started_total").increment(1);
}

/// Record an A/B test finish.
pub fn record_ab_test_finished() {
    counter!("arbiter_ab_tests_finished_total").increment(1);
}
