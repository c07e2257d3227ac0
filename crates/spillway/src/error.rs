//! Error types for spillway workflows.

use snafu::prelude::*;

pub use sluice_core::error::{ConfigError, StorageError, WarehouseError};

/// Errors from waiting on the source object.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GateError {
    /// The object did not appear before the deadline.
    #[snafu(display("{object} did not appear within {waited_secs}s"))]
    Timeout { object: String, waited_secs: u64 },

    /// Shutdown was requested while waiting.
    #[snafu(display("Stopped waiting for {object}: shutdown requested"))]
    #[snafu(context(name(GateCancelledSnafu)))]
    Cancelled { object: String },

    /// The existence check itself failed.
    #[snafu(display("Failed to check {object}: {source}"))]
    Check { object: String, source: StorageError },
}

impl GateError {
    /// Only a failed storage check is worth another attempt. A timeout has
    /// already waited the full budget.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Check { .. })
    }
}

/// Errors from turning discovered categories into jobs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PlanError {
    /// Distinct category values map to the same identifier.
    #[snafu(display("Category values collide after sanitizing: {}", groups.join("; ")))]
    Collision { groups: Vec<String> },

    /// A configured column name cannot be used as an identifier.
    #[snafu(display("Invalid column in job template: {source}"))]
    InvalidColumn { source: WarehouseError },

    /// A derived table or view name is not a valid table name.
    #[snafu(display("Invalid derived name for category {category:?}: {source}"))]
    InvalidName {
        category: String,
        source: WarehouseError,
    },
}

/// Errors that end a workflow run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WorkflowError {
    /// The source location could not be set up.
    #[snafu(display("Failed to open source {url}: {source}"))]
    Source { url: String, source: StorageError },

    /// The warehouse client could not be created.
    #[snafu(display("Failed to connect to the warehouse: {source}"))]
    Connect { source: WarehouseError },

    /// The source object never became available.
    #[snafu(display("Waiting for the source failed: {source}"))]
    Gate { source: GateError },

    /// Loading the staging table failed.
    #[snafu(display("Loading the staging table failed: {source}"))]
    Load { source: WarehouseError },

    /// Listing distinct categories failed.
    #[snafu(display("Category discovery failed: {source}"))]
    Discover { source: WarehouseError },

    /// Category jobs could not be planned.
    #[snafu(display("Planning category jobs failed: {source}"))]
    Plan { source: PlanError },

    /// One or more category jobs failed after retries.
    #[snafu(display("{} of {total} category job(s) failed: {}", failed.len(), failed.join(", ")))]
    JobsFailed { failed: Vec<String>, total: usize },

    /// Shutdown was requested before the run finished.
    #[snafu(display("Workflow cancelled during {step}"))]
    Cancelled { step: &'static str },
}
