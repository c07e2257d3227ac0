//! Log output for the sluice and spillway binaries.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter used when `RUST_LOG` is unset. Client libraries are noisy at info.
const DEFAULT_FILTER: &str = "info,gcp_bigquery_client=warn,object_store=warn,hyper=warn";

/// Install the global fmt subscriber.
///
/// Repeated calls are ignored, so tests and embedders can call this freely.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
