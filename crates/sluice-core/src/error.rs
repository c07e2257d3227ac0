//! Common error types shared between sluice and spillway.
//!
//! This module defines error types for storage, warehouse, configuration and
//! metrics operations that are used by both crates.

use snafu::prelude::*;

// ============ Storage Errors ============

/// Errors that can occur during storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// Invalid storage URL format.
    #[snafu(display("Invalid storage URL: {url}"))]
    InvalidUrl { url: String },

    /// Object URL does not name an object (empty final segment).
    #[snafu(display("Storage URL does not point at an object: {url}"))]
    MissingObjectName { url: String },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed: {source}"))]
    ObjectStore { source: object_store::Error },

    /// GCS configuration error.
    #[snafu(display("GCS configuration error: {source}"))]
    GcsConfig { source: object_store::Error },
}

// ============ Warehouse Errors ============

/// Errors that can occur while talking to the data warehouse.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WarehouseError {
    /// Failed to construct the warehouse client.
    #[snafu(display("Failed to create warehouse client: {source}"))]
    ClientInit {
        source: gcp_bigquery_client::error::BQError,
    },

    /// The warehouse rejected or failed a statement.
    #[snafu(display("{kind} statement failed: {source}"))]
    Statement {
        kind: &'static str,
        source: gcp_bigquery_client::error::BQError,
    },

    /// The statement did not finish within the configured budget.
    #[snafu(display("{kind} statement did not complete within {timeout_secs}s (job {job_id})"))]
    Incomplete {
        kind: &'static str,
        job_id: String,
        timeout_secs: u64,
    },

    /// A requested result column was absent from the result schema.
    #[snafu(display("Result set has no column named '{column}'"))]
    MissingColumn { column: String },

    /// Invalid fully-qualified table name.
    #[snafu(display("Invalid table name '{name}': {reason}"))]
    InvalidTableName { name: String, reason: &'static str },

    /// Invalid column identifier.
    #[snafu(display("Invalid column identifier '{name}': {reason}"))]
    InvalidIdentifier { name: String, reason: &'static str },

    /// Failure reported by a non-BigQuery warehouse implementation.
    #[snafu(display("{message}"))]
    Backend { message: String },
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// A required string field is empty for a component.
    #[snafu(display("{component} '{key}' has empty {field}"))]
    EmptyField {
        component: &'static str,
        key: String,
        field: &'static str,
    },

    /// A field has an invalid value for a component.
    #[snafu(display("{component} '{key}' has invalid {field}: {message}"))]
    InvalidField {
        component: &'static str,
        key: String,
        field: &'static str,
        message: String,
    },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Duplicate component keys found across config files.
    #[snafu(display("Duplicate component keys: {}", keys.join(", ")))]
    DuplicateComponents { keys: Vec<String> },

    /// No components were defined in any config source.
    #[snafu(display("No {component}s defined in configuration"))]
    NoComponents { component: &'static str },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Failed to read configuration directory.
    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Multiple configuration errors occurred.
    #[snafu(display("Multiple config errors:\n{}", errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics recorder already initialized (double-init attempted).
    #[snafu(display("Metrics recorder already initialized"))]
    AlreadyInitialized,

    /// Metrics not initialized (controller accessed before init).
    #[snafu(display("Metrics recorder not initialized"))]
    NotInitialized,
}

// ============ Pipeline Setup Errors ============

/// Errors that can occur while setting up components (before running).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineSetupError {
    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Failed to initialize metrics.
    #[snafu(display("Failed to initialize metrics: {source}"))]
    Metrics { source: MetricsError },

    /// One or more components finished with an error.
    #[snafu(display("{failed} of {total} {typetag}(s) failed"))]
    ComponentsFailed {
        failed: usize,
        total: usize,
        typetag: &'static str,
    },
}
