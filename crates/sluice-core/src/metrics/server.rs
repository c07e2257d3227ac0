//! Prometheus recorder with singleton-based initialization.
//!
//! The recorder is installed once per process. When a metrics address is
//! configured an HTTP endpoint serves:
//! - `/metrics` - Prometheus metrics in text format
//! - `/health` - returns 200 OK

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu, PrometheusInitSnafu};

/// Histogram buckets (seconds). Warehouse statements and sensor waits run
/// far longer than storage requests, hence the long tail.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();

/// Handle to the installed Prometheus recorder.
pub struct MetricsController {
    handle: PrometheusHandle,
}

fn install_recorder() -> Result<(), MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?
        .install_recorder()
        .context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController { handle })
        .map_err(|_| AlreadyInitializedSnafu.build())
}

/// Install the recorder and, if `addr` is given, serve it over HTTP.
///
/// Must be called from within a tokio runtime when an address is given.
pub fn init_global(addr: Option<SocketAddr>) -> Result<(), MetricsError> {
    install_recorder()?;

    if let Some(addr) = addr {
        tokio::spawn(run_server(addr));
        info!(%addr, "Metrics server started");
    }
    Ok(())
}

/// Install the recorder for tests without starting an endpoint.
///
/// Safe to call from many test threads at once.
pub fn init_test() {
    if install_recorder().is_err() {
        while CONTROLLER.get().is_none() {
            std::hint::spin_loop();
        }
    }
}

impl MetricsController {
    /// Get a reference to the global metrics controller.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

async fn run_server(addr: SocketAddr) {
    let Ok(controller) = MetricsController::get() else {
        error!("Metrics server started before recorder installation");
        return;
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(controller.handle.clone()));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", e);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit;
    use crate::metrics::events::{FileProcessed, FileStatus};

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
        assert!(MetricsController::get().is_ok());
    }

    #[test]
    fn test_render_contains_emitted_event() {
        init_test();

        emit!(FileProcessed {
            status: FileStatus::Skipped,
            target: "render-test".to_string(),
        });

        let output = MetricsController::get().unwrap().render();
        assert!(output.contains("sluice_files_processed_total"));
        assert!(output.contains("render-test"));
    }
}
