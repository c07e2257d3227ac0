//! sluice-core: Shared components for the sluice and spillway crates.
//!
//! - `storage/` - Object storage abstraction (GCS, local)
//! - `warehouse/` - Warehouse client trait, BigQuery implementation, SQL quoting
//! - `metrics/` - Prometheus metrics infrastructure
//! - `config/` - Multi-file YAML config with environment variable interpolation
//! - `topology/` - Pipeline runner and step retry policy
//! - `polling` - Poll-until-ready loop
//! - `signal` - Signal handling for graceful shutdown
//! - `error` - Common error types
//! - `app` - Application abstraction for reducing main.rs boilerplate

pub mod app;
pub mod config;
pub mod error;
pub mod metrics;
pub mod polling;
pub mod signal;
pub mod storage;
pub mod topology;
pub mod tracing;
pub mod warehouse;

pub use app::{AppConfig, Application};
pub use config::{CliArgs, ComponentKey, GlobalConfig, MetricsConfig, StorageLocation};
pub use error::{ConfigError, MetricsError, PipelineSetupError, StorageError, WarehouseError};
pub use self::metrics::{MetricsController, init_global as init_metrics, init_test as init_metrics_test};
pub use polling::{PollOutcome, Probe, poll_until};
pub use signal::shutdown_signal;
pub use storage::{StorageProvider, StorageProviderRef};
pub use topology::{
    Pipeline, PipelineContext, PipelineRunner, RetryPolicy, RunSummary, StepError,
    random_jitter, run_pipelines,
};
pub use self::tracing::init_tracing;
pub use warehouse::{Statement, StatementKind, TableName, Warehouse, WarehouseRef};
