//! Configuration for spillway workflows.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use sluice_core::config::{GlobalConfig, Mergeable, MetricsConfig, StorageLocation};
use sluice_core::error::ConfigError;
use sluice_core::storage::{BackendConfig, split_object_url};
use sluice_core::warehouse::{BigQueryConfig, TableName, quote_identifier};
use sluice_core::{AppConfig, PipelineContext};
use tracing::info;

use crate::workflow::WorkflowPipeline;

sluice_core::component_key!(
    /// Identifier for a workflow in spillway configuration.
    WorkflowKey
);

/// How long to wait for the source object, and how often to look.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_poke_interval")]
    pub poke_interval_secs: u64,
}

fn default_sensor_timeout() -> u64 {
    300
}

fn default_poke_interval() -> u64 {
    30
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_sensor_timeout(),
            poke_interval_secs: default_poke_interval(),
        }
    }
}

impl SensorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poke_interval(&self) -> Duration {
        Duration::from_secs(self.poke_interval_secs)
    }
}

/// Bulk load of the source CSV into the staging table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadConfig {
    /// Fully-qualified staging table, replaced on every run.
    pub staging_table: TableName,
    #[serde(default = "default_field_delimiter")]
    pub field_delimiter: String,
    #[serde(default = "default_skip_leading_rows")]
    pub skip_leading_rows: u32,
    /// Accept rows missing trailing columns.
    #[serde(default = "default_true")]
    pub allow_jagged_rows: bool,
    /// Ignore values beyond the detected columns.
    #[serde(default = "default_true")]
    pub ignore_unknown_values: bool,
}

fn default_field_delimiter() -> String {
    ",".to_string()
}

fn default_skip_leading_rows() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// A column projected by the per-category view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewColumn {
    /// Column name in the staging data.
    pub name: String,
    /// Name exposed by the view.
    pub alias: String,
}

impl ViewColumn {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }
}

/// Where and how the per-category tables and views are created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DerivedConfig {
    /// Dataset holding `<identifier><table_suffix>` tables.
    pub table_dataset: String,
    /// Dataset holding the views; the table dataset if unset.
    #[serde(default)]
    pub view_dataset: Option<String>,
    #[serde(default = "default_table_suffix")]
    pub table_suffix: String,
    #[serde(default = "default_view_suffix")]
    pub view_suffix: String,
    #[serde(default = "default_view_columns")]
    pub view_columns: Vec<ViewColumn>,
    /// Boolean column the view filters on.
    #[serde(default = "default_filter_column")]
    pub filter_column: String,
    /// Rows are kept where `filter_column` equals this value.
    #[serde(default)]
    pub filter_value: bool,
}

fn default_table_suffix() -> String {
    "_table".to_string()
}

fn default_view_suffix() -> String {
    "_view".to_string()
}

fn default_view_columns() -> Vec<ViewColumn> {
    vec![
        ViewColumn::new("Year", "year"),
        ViewColumn::new("Disease Name", "disease_name"),
        ViewColumn::new("Disease Category", "disease_category"),
        ViewColumn::new("Prevalence Rate", "prevalence_rate"),
        ViewColumn::new("Incidence Rate", "incidence_rate"),
    ]
}

fn default_filter_column() -> String {
    "Availability of Vaccines Treatment".to_string()
}

impl DerivedConfig {
    pub fn view_dataset(&self) -> &str {
        self.view_dataset.as_deref().unwrap_or(&self.table_dataset)
    }
}

/// What to do when two category values sanitize to the same identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Fail the run before any table is created.
    #[default]
    Reject,
    /// Keep the first value (by raw value order) as is, suffix the rest.
    Disambiguate,
}

fn default_partition_column() -> String {
    "country".to_string()
}

/// One load-and-fan-out workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Full URL of the source object, e.g. `gs://bucket/uploads/data_2025-04-27.csv`.
    pub source: StorageLocation,
    #[serde(default)]
    pub sensor: SensorConfig,
    pub warehouse: BigQueryConfig,
    pub load: LoadConfig,
    /// Column whose distinct values drive the fan-out.
    #[serde(default = "default_partition_column")]
    pub partition_column: String,
    pub derived: DerivedConfig,
    #[serde(default)]
    pub on_collision: CollisionPolicy,
}

/// Main configuration for spillway.
///
/// # Example
///
/// ```yaml
/// workflows:
///   health:
///     source:
///       url: gs://data-engineering/uploads/global_health_data_2025-04-27.csv
///     warehouse:
///       project_id: analytics-prod
///     load:
///       staging_table: analytics-prod.staging_data.global_data
///     derived:
///       table_dataset: reporting
///
/// global:
///   retries: 1
///   max_parallel_jobs: 16
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpillwayConfig {
    /// Named workflow configurations.
    #[serde(default)]
    pub workflows: IndexMap<WorkflowKey, WorkflowConfig>,
    /// Global configuration options.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for SpillwayConfig {
    type Key = WorkflowKey;
    type Component = WorkflowConfig;

    const COMPONENT_NAME: &'static str = "workflow";

    fn components(&self) -> &IndexMap<WorkflowKey, WorkflowConfig> {
        &self.workflows
    }

    fn components_mut(&mut self) -> &mut IndexMap<WorkflowKey, WorkflowConfig> {
        &mut self.workflows
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

    fn validate_component(key: &WorkflowKey, workflow: &WorkflowConfig) -> Vec<ConfigError> {
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

        let url = &workflow.source.url;
        if url.is_empty() {
            errors.push(empty("source.url"));
        } else if let Err(e) =
            split_object_url(url).and_then(|(parent, _)| BackendConfig::parse_url(parent))
        {
            errors.push(invalid("source.url", e.to_string()));
        }

        if workflow.sensor.poke_interval_secs == 0 {
            errors.push(invalid("sensor.poke_interval_secs", "must be positive".into()));
        }

        if workflow.warehouse.project_id.is_empty() {
            errors.push(empty("warehouse.project_id"));
        }
        if workflow.warehouse.query_timeout_secs == 0 {
            errors.push(invalid("warehouse.query_timeout_secs", "must be positive".into()));
        }

        if workflow.load.field_delimiter.is_empty() {
            errors.push(empty("load.field_delimiter"));
        }

        if let Err(e) = quote_identifier(&workflow.partition_column) {
            errors.push(invalid("partition_column", e.to_string()));
        }

        let derived = &workflow.derived;
        let project = &workflow.warehouse.project_id;
        for (field, dataset) in [
            ("derived.table_dataset", derived.table_dataset.as_str()),
            ("derived.view_dataset", derived.view_dataset()),
        ] {
            if dataset.is_empty() {
                errors.push(empty(field));
            } else if project.is_empty() {
                continue;
            } else if let Err(e) = TableName::new(project.as_str(), dataset, "probe") {
                errors.push(invalid(field, e.to_string()));
            }
        }

        if derived.view_columns.is_empty() {
            errors.push(empty("derived.view_columns"));
        }
        for column in &derived.view_columns {
            for name in [&column.name, &column.alias] {
                if let Err(e) = quote_identifier(name) {
                    errors.push(invalid("derived.view_columns", e.to_string()));
                }
            }
        }
        if let Err(e) = quote_identifier(&derived.filter_column) {
            errors.push(invalid("derived.filter_column", e.to_string()));
        }

        errors
    }
}

impl AppConfig for SpillwayConfig {
    type Pipeline = WorkflowPipeline;

    fn create_pipelines(&self, context: PipelineContext) -> Vec<WorkflowPipeline> {
        self.workflows
            .iter()
            .map(|(key, workflow)| {
                WorkflowPipeline::new(key.clone(), workflow.clone(), context.clone())
            })
            .collect()
    }

    fn log_startup_info(&self) {
        info!(
            "Starting spillway with {} workflow(s)",
            self.workflows.len()
        );
        for (key, workflow) in &self.workflows {
            info!(
                "  Workflow: {} ({} -> {})",
                key, workflow.source.url, workflow.load.staging_table
            );
        }
    }
}
