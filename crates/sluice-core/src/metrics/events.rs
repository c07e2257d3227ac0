//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in an upload or
//! workflow run. Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric. Per-component events carry a `target`
//! label holding the watch or workflow key.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

// ============================================================================
// Storage
// ============================================================================

/// Object storage operation kind.
#[derive(Debug, Clone, Copy)]
pub enum StorageOperation {
    Head,
    Put,
}

impl StorageOperation {
    fn as_str(&self) -> &'static str {
        match self {
            StorageOperation::Head => "head",
            StorageOperation::Put => "put",
        }
    }
}

/// Outcome of a remote request.
#[derive(Debug, Clone, Copy)]
pub enum RequestStatus {
    Success,
    NotFound,
    Error,
}

impl RequestStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Success => "success",
            RequestStatus::NotFound => "not_found",
            RequestStatus::Error => "error",
        }
    }
}

/// Event emitted for every object storage request.
pub struct StorageRequest {
    pub operation: StorageOperation,
    pub status: RequestStatus,
}

impl InternalEvent for StorageRequest {
    fn emit(self) {
        trace!(
            operation = self.operation.as_str(),
            status = self.status.as_str(),
            "Storage request"
        );
        counter!(
            "sluice_storage_requests_total",
            "operation" => self.operation.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted with the latency of an object storage request.
pub struct StorageRequestDuration {
    pub operation: StorageOperation,
    pub duration: Duration,
}

impl InternalEvent for StorageRequestDuration {
    fn emit(self) {
        histogram!(
            "sluice_storage_request_duration_seconds",
            "operation" => self.operation.as_str()
        )
        .record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Uploader
// ============================================================================

/// Event emitted after scanning a watch directory.
pub struct FilesDiscovered {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for FilesDiscovered {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Files discovered");
        counter!("sluice_files_discovered_total", "target" => self.target).increment(self.count);
    }
}

/// What happened to an eligible local file.
#[derive(Debug, Clone, Copy)]
pub enum FileStatus {
    Uploaded,
    Skipped,
}

impl FileStatus {
    fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Uploaded => "uploaded",
            FileStatus::Skipped => "skipped",
        }
    }
}

/// Event emitted when an eligible file is uploaded or skipped.
pub struct FileProcessed {
    pub status: FileStatus,
    pub target: String,
}

impl InternalEvent for FileProcessed {
    fn emit(self) {
        trace!(status = self.status.as_str(), target = %self.target, "File processed");
        counter!(
            "sluice_files_processed_total",
            "status" => self.status.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}

/// Event emitted with the size of an uploaded file.
pub struct BytesUploaded {
    pub bytes: u64,
    pub target: String,
}

impl InternalEvent for BytesUploaded {
    fn emit(self) {
        trace!(bytes = self.bytes, target = %self.target, "Bytes uploaded");
        counter!("sluice_bytes_uploaded_total", "target" => self.target).increment(self.bytes);
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// Event emitted for every existence check of the awaited object.
pub struct SensorPoke {
    pub found: bool,
    pub target: String,
}

impl InternalEvent for SensorPoke {
    fn emit(self) {
        let result = if self.found { "found" } else { "missing" };
        trace!(result, target = %self.target, "Sensor poke");
        counter!("sluice_sensor_pokes_total", "result" => result, "target" => self.target)
            .increment(1);
    }
}

/// Event emitted for every statement submitted to the warehouse.
pub struct WarehouseStatement {
    pub kind: &'static str,
    pub status: RequestStatus,
}

impl InternalEvent for WarehouseStatement {
    fn emit(self) {
        trace!(kind = self.kind, status = self.status.as_str(), "Warehouse statement");
        counter!(
            "sluice_warehouse_statements_total",
            "kind" => self.kind,
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}

/// Event emitted with the wall time of a warehouse statement.
pub struct WarehouseStatementDuration {
    pub kind: &'static str,
    pub duration: Duration,
}

impl InternalEvent for WarehouseStatementDuration {
    fn emit(self) {
        histogram!("sluice_warehouse_statement_duration_seconds", "kind" => self.kind)
            .record(self.duration.as_secs_f64());
    }
}

/// Final state of a step or job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Success,
    Failed,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Failed => "failed",
            StepStatus::Cancelled => "cancelled",
        }
    }
}

/// Event emitted when a step attempt fails and will be retried.
pub struct StepRetried {
    pub step: &'static str,
    pub target: String,
}

impl InternalEvent for StepRetried {
    fn emit(self) {
        trace!(step = self.step, target = %self.target, "Step retried");
        counter!("sluice_step_retries_total", "step" => self.step, "target" => self.target)
            .increment(1);
    }
}

/// Event emitted when a step reaches a final state.
pub struct StepCompleted {
    pub step: &'static str,
    pub status: StepStatus,
    pub duration: Duration,
    pub target: String,
}

impl InternalEvent for StepCompleted {
    fn emit(self) {
        trace!(
            step = self.step,
            status = self.status.as_str(),
            duration_ms = self.duration.as_millis(),
            target = %self.target,
            "Step completed"
        );
        counter!(
            "sluice_steps_total",
            "step" => self.step,
            "status" => self.status.as_str(),
            "target" => self.target.clone()
        )
        .increment(1);
        histogram!(
            "sluice_step_duration_seconds",
            "step" => self.step,
            "target" => self.target
        )
        .record(self.duration.as_secs_f64());
    }
}

/// Event emitted with the number of distinct category values found.
pub struct CategoriesDiscovered {
    pub count: u64,
    pub target: String,
}

impl InternalEvent for CategoriesDiscovered {
    fn emit(self) {
        trace!(count = self.count, target = %self.target, "Categories discovered");
        counter!("sluice_categories_discovered_total", "target" => self.target)
            .increment(self.count);
    }
}

/// Event emitted when a whole workflow run finishes.
pub struct WorkflowCompleted {
    pub status: StepStatus,
    pub target: String,
}

impl InternalEvent for WorkflowCompleted {
    fn emit(self) {
        trace!(status = self.status.as_str(), target = %self.target, "Workflow completed");
        counter!(
            "sluice_workflows_total",
            "status" => self.status.as_str(),
            "target" => self.target
        )
        .increment(1);
    }
}
