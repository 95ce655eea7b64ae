//! Prometheus metrics for the subscriber pipeline.
//!
//! The recorder installs process-wide once; the scrape endpoint is
//! best-effort. A subscriber keeps landing records even when the metrics
//! port is unavailable.

use std::net::SocketAddr;
use std::sync::OnceLock;

use axum::{Router, routing::get};
use metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::error;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub enable: bool,
    /// Standalone scrape listener; `None` to only mount the route into an
    /// existing router via [`router`].
    pub http_listener: Option<SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable: true,
            http_listener: Some(([0, 0, 0, 0], 9095).into()),
        }
    }
}

pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if !cfg.enable {
        return Ok(());
    }

    RECORDER.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("metrics recorder installation failed")
    });

    if let Some(addr) = cfg.http_listener {
        tokio::spawn(expose(addr));
    }

    register_descriptions();
    Ok(())
}

/// Serve `/metrics` on its own port. One bind attempt: a taken port means a
/// misconfiguration worth logging, not something to fight over.
async fn expose(addr: SocketAddr) {
    match TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, router()).await {
                error!(error = %e, %addr, "scrape endpoint stopped");
            }
        }
        Err(e) => {
            error!(error = %e, %addr, "could not bind the scrape endpoint");
        }
    }
}

/// The `/metrics` route, for mounting into a host router.
pub fn router() -> Router {
    Router::new().route("/metrics", get(render))
}

async fn render() -> String {
    match RECORDER.get() {
        Some(handle) => handle.render(),
        None => "# metrics recorder not installed\n".into(),
    }
}

fn register_descriptions() {
    describe_counter!(
        "shapesink_datapoints_total",
        Unit::Count,
        "Data points received per shape"
    );
    describe_counter!(
        "shapesink_shape_cache_hits_total",
        Unit::Count,
        "Shape recognitions served from the cache"
    );
    describe_counter!(
        "shapesink_shape_cache_misses_total",
        Unit::Count,
        "Shape lookups that required analysis"
    );
    describe_counter!(
        "shapesink_shape_evolutions_total",
        Unit::Count,
        "Deltas merged into an existing known shape"
    );
    describe_counter!(
        "shapesink_ddl_failures_total",
        Unit::Count,
        "Schema changes rejected by the destination"
    );
    describe_counter!(
        "shapesink_dml_failures_total",
        Unit::Count,
        "Row writes rejected by the destination"
    );
    describe_counter!(
        "shapesink_panics_total",
        Unit::Count,
        "Panics captured by the installed hook"
    );
}
