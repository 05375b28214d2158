//! Prometheus metrics endpoint.
//!
//! Installs the global recorder and serves `/metrics` plus a `/health`
//! liveness endpoint over HTTP.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::error::{BindSnafu, MetricsError, PrometheusInitSnafu};

/// Install the Prometheus recorder and start the metrics HTTP server.
///
/// Binding happens up front so an unusable address fails startup instead of
/// being discovered later in a background task.
pub async fn init(addr: SocketAddr) -> Result<(), MetricsError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    let listener = TcpListener::bind(addr).await.context(BindSnafu)?;
    debug!("Metrics endpoint listening on http://{addr}/metrics");

    tokio::spawn(serve(listener, handle));
    Ok(())
}

async fn serve(listener: TcpListener, handle: PrometheusHandle) {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(handle));

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {e}");
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
