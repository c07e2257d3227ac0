//! Configuration for the sluice uploader.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::FixedOffset;
use sluice_core::config::{GlobalConfig, Mergeable, MetricsConfig};
use sluice_core::error::ConfigError;
use sluice_core::storage::BackendConfig;
use sluice_core::{AppConfig, PipelineContext};
use tracing::info;

use crate::pipeline::WatchPipeline;
use crate::selection::{is_valid_date_format, parse_utc_offset};

sluice_core::component_key!(
    /// Identifier for a watch directory in sluice configuration.
    WatchKey
);

fn default_extension() -> String {
    ".csv".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_utc_offset() -> String {
    "+05:30".to_string()
}

/// One local directory whose dated drops are copied to a destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Local directory to scan (not recursive).
    pub directory: PathBuf,
    /// Storage URL objects are written below, e.g. `gs://bucket/uploads`.
    pub destination: String,
    /// Required file name suffix.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// strftime pattern for the date a file name must contain.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    /// Fixed offset from UTC that defines "today". Defaults to India Standard Time.
    #[serde(default = "default_utc_offset")]
    pub utc_offset: String,
    /// Storage options for the destination (credentials, endpoints).
    #[serde(default)]
    pub storage_options: HashMap<String, String>,
}

impl WatchConfig {
    /// The parsed UTC offset, if `utc_offset` is well-formed.
    pub fn offset(&self) -> Option<FixedOffset> {
        parse_utc_offset(&self.utc_offset)
    }
}

/// Main configuration for sluice.
///
/// # Example
///
/// ```yaml
/// watches:
///   health:
///     directory: /srv/drops/health
///     destination: gs://data-engineering/uploads
///
/// metrics:
///   address: 0.0.0.0:9090
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploaderConfig {
    /// Named watch configurations.
    #[serde(default)]
    pub watches: IndexMap<WatchKey, WatchConfig>,
    /// Global configuration options.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for UploaderConfig {
    type Key = WatchKey;
    type Component = WatchConfig;

    const COMPONENT_NAME: &'static str = "watch";

    fn components(&self) -> &IndexMap<WatchKey, WatchConfig> {
        &self.watches
    }

    fn components_mut(&mut self) -> &mut IndexMap<WatchKey, WatchConfig> {
        &mut self.watches
    }

    fn global(&self) -> &GlobalConfig {
        &self.global
    }

    fn global_mut(&mut self) -> &mut GlobalConfig {
        &mut self.global
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsConfig {
        &mut self.metrics
    }

    fn validate_component(key: &WatchKey, watch: &WatchConfig) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let component = Self::COMPONENT_NAME;
        let key = key.to_string();

        let empty = |field| ConfigError::EmptyField {
            component,
            key: key.clone(),
            field,
        };
        let invalid = |field, message: String| ConfigError::InvalidField {
            component,
            key: key.clone(),
            field,
            message,
        };

        if watch.directory.as_os_str().is_empty() {
            errors.push(empty("directory"));
        }
        if watch.extension.is_empty() {
            errors.push(empty("extension"));
        }

        if watch.destination.is_empty() {
            errors.push(empty("destination"));
        } else if let Err(e) = BackendConfig::parse_url(&watch.destination) {
            errors.push(invalid("destination", e.to_string()));
        }

        if !is_valid_date_format(&watch.date_format) {
            errors.push(invalid(
                "date_format",
                format!("'{}' is not a valid strftime pattern", watch.date_format),
            ));
        }
        if parse_utc_offset(&watch.utc_offset).is_none() {
            errors.push(invalid(
                "utc_offset",
                format!("'{}' is not an offset like +05:30", watch.utc_offset),
            ));
        }

        errors
    }
}

impl AppConfig for UploaderConfig {
    type Pipeline = WatchPipeline;

    fn create_pipelines(&self, context: PipelineContext) -> Vec<WatchPipeline> {
        self.watches
            .iter()
            .map(|(key, watch)| WatchPipeline::new(key.clone(), watch.clone(), context.clone()))
            .collect()
    }

    fn log_startup_info(&self) {
        info!(
            "Starting sluice uploader with {} watch(es)",
            self.watches.len()
        );
        for (key, watch) in &self.watches {
            info!(
                "  Watch: {} ({} -> {})",
                key,
                watch.directory.display(),
                watch.destination
            );
        }
    }

    fn on_success(&self) {
        info!("All files uploaded");
    }
}
