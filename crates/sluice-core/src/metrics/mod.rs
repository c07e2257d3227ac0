//! Metrics and observability infrastructure.
//!
//! - `events`: Internal event types and the `InternalEvent` trait
//! - `server`: Prometheus recorder and optional HTTP endpoint

pub mod events;
pub mod server;

pub use server::{MetricsController, init_global, init_test};

/// Macro for emitting metric events.
///
/// Calls `InternalEvent::emit()` on the given event, which records the
/// corresponding Prometheus metric.
///
/// ```ignore
/// use sluice_core::metrics::events::{FileProcessed, FileStatus};
///
/// emit!(FileProcessed { status: FileStatus::Uploaded, target: "drop".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}

pub use crate::emit;
