//! Spillway: load a dated CSV into the warehouse and fan it out by category.
//!
//! Each workflow runs the same fixed sequence:
//!
//! 1. wait for the source object to exist (`sensor`)
//! 2. overwrite the staging table with it (`load`)
//! 3. list the distinct values of the partition column (`discovery`)
//! 4. build one table and one view statement per value (`jobs`)
//! 5. run every category job in parallel (`materialize`)
//! 6. mark the run complete once all of them succeeded (`workflow`)

pub mod config;
pub mod discovery;
pub mod error;
pub mod jobs;
pub mod load;
pub mod materialize;
pub mod sensor;
pub mod workflow;

pub use config::{CollisionPolicy, SpillwayConfig, WorkflowConfig, WorkflowKey};
pub use discovery::Discovery;
pub use error::{GateError, PlanError, WorkflowError};
pub use jobs::{CategoryJob, JobTemplate, sanitize};
pub use load::BulkLoader;
pub use materialize::materialize;
pub use sensor::ExistenceGate;
pub use workflow::{RunReport, Workflow, WorkflowPipeline};
