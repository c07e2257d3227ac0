//! Common configuration types shared between sluice and spillway.

mod component_key;
mod global;
mod loader;
mod path;
mod vars;

pub use component_key::ComponentKey;
pub use global::GlobalConfig;
pub use loader::{Mergeable, load_from_paths, load_from_str};
pub use path::{CliArgs, ConfigPath, is_yaml_file};
pub use vars::{InterpolationResult, interpolate, interpolate_with};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics configuration for the Prometheus endpoint.
///
/// Batch runs are short-lived, so the endpoint is only served when an
/// address is configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server (e.g. "0.0.0.0:9090").
    #[serde(default)]
    pub address: Option<String>,
}

impl MetricsConfig {
    /// Merge values from another MetricsConfig (last-write-wins).
    pub fn merge_from(&mut self, other: Self) {
        if other.address.is_some() {
            self.address = other.address;
        }
    }
}

/// Location plus credentials for an object storage URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageLocation {
    /// Storage URL (`gs://bucket/prefix`, `file:///path`, `/path`).
    pub url: String,
    /// Backend options (credentials, endpoints).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}
