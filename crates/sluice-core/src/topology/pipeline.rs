//! Pipeline orchestration primitives.
//!
//! Runs every configured component concurrently with shared shutdown
//! handling and jittered starts. Components here are batch runs: each one
//! finishes on its own and the runner reports how many failed.

use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use snafu::ResultExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GlobalConfig;
use crate::error::{AddressParseSnafu, MetricsSnafu, PipelineSetupError};
use crate::signal::shutdown_signal;

use super::RetryPolicy;

/// Shared resources for pipeline execution.
#[derive(Clone)]
pub struct PipelineContext {
    /// Optional process-wide bound on concurrently running fan-out jobs.
    pub job_semaphore: Option<Arc<Semaphore>>,
    /// Retry policy applied to every step.
    pub retry: RetryPolicy,
    /// Maximum jitter in seconds before a component starts.
    pub poll_jitter_secs: u64,
    /// Cancellation token for graceful shutdown.
    pub shutdown: CancellationToken,
}

impl PipelineContext {
    pub fn new(global: &GlobalConfig, shutdown: CancellationToken) -> Self {
        Self {
            job_semaphore: global
                .max_parallel_jobs
                .map(|n| Arc::new(Semaphore::new(n.max(1)))),
            retry: global.retry_policy(),
            poll_jitter_secs: global.poll_jitter_secs,
            shutdown,
        }
    }
}

/// A self-contained pipeline unit that can be executed.
///
/// Implement this trait for your specific pipeline type. The runner will
/// handle spawning, jittered starts, and result collection.
pub trait Pipeline: Send + 'static {
    /// The key type used to identify this pipeline.
    type Key: Clone + Display + Send + 'static;

    /// The error type returned by this pipeline.
    type Error: std::error::Error + Send + 'static;

    /// Get a reference to the pipeline's key.
    fn key(&self) -> &Self::Key;

    /// Run this pipeline to completion.
    fn run(self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// Tally of a finished runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub failed: usize,
}

/// Orchestrates multiple pipeline executions with shared shutdown handling.
pub struct PipelineRunner<P: Pipeline> {
    pipelines: Vec<P>,
    shutdown: CancellationToken,
    poll_jitter_secs: u64,
    typetag: &'static str,
}

impl<P: Pipeline> PipelineRunner<P> {
    pub fn new(
        pipelines: Vec<P>,
        shutdown: CancellationToken,
        poll_jitter_secs: u64,
        typetag: &'static str,
    ) -> Self {
        Self {
            pipelines,
            shutdown,
            poll_jitter_secs,
            typetag,
        }
    }

    /// Spawn the shutdown signal handler.
    pub fn spawn_shutdown_handler(&self) {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    /// Run all pipelines to completion.
    #[allow(clippy::type_complexity)]
    pub async fn run(self) -> RunSummary {
        let mut handles: JoinSet<(P::Key, Result<(), P::Error>)> = JoinSet::new();
        let typetag = self.typetag;

        for pipeline in self.pipelines {
            let shutdown = self.shutdown.clone();
            let key = pipeline.key().clone();
            let start_jitter = random_jitter(self.poll_jitter_secs);

            handles.spawn(async move {
                if !start_jitter.is_zero() {
                    info!(
                        target = %key,
                        jitter_secs = start_jitter.as_secs(),
                        "Delaying {} start for jitter", typetag
                    );
                    if shutdown
                        .run_until_cancelled(tokio::time::sleep(start_jitter))
                        .await
                        .is_none()
                    {
                        info!(target = %key, "Shutdown requested during jitter delay");
                        return (key, Ok(()));
                    }
                }

                let result = pipeline.run().await;
                (key, result)
            });
        }

        let mut summary = RunSummary {
            total: handles.len(),
            failed: 0,
        };
        info!("Spawned {} {} tasks", summary.total, typetag);

        while let Some(result) = handles.join_next().await {
            match result {
                Ok((key, Ok(()))) => {
                    info!(target = %key, "{} completed", typetag);
                }
                Ok((key, Err(e))) => {
                    error!(target = %key, error = %e, "{} failed", typetag);
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "{} task panicked", typetag);
                    summary.failed += 1;
                }
            }
        }

        info!(
            failed = summary.failed,
            "All {}s finished", typetag
        );
        summary
    }
}

/// Run pipelines with shared setup logic.
///
/// 1. Initialize metrics, serving them if an address is configured
/// 2. Create shutdown token and pipeline context
/// 3. Create pipelines via the provided closure
/// 4. Run all pipelines with graceful shutdown handling
///
/// Returns an error if any pipeline failed.
pub async fn run_pipelines<P, F>(
    metrics_address: Option<&str>,
    global: &GlobalConfig,
    typetag: &'static str,
    create_pipelines: F,
) -> Result<(), PipelineSetupError>
where
    P: Pipeline,
    F: FnOnce(PipelineContext) -> Vec<P>,
{
    let addr: Option<SocketAddr> = metrics_address
        .map(str::parse)
        .transpose()
        .context(AddressParseSnafu)?;
    crate::metrics::init_global(addr).context(MetricsSnafu)?;

    let shutdown = CancellationToken::new();
    let context = PipelineContext::new(global, shutdown.clone());

    let pipelines = create_pipelines(context);

    let runner = PipelineRunner::new(pipelines, shutdown, global.poll_jitter_secs, typetag);
    runner.spawn_shutdown_handler();
    let summary = runner.run().await;

    if summary.failed > 0 {
        return Err(PipelineSetupError::ComponentsFailed {
            failed: summary.failed,
            total: summary.total,
            typetag,
        });
    }
    Ok(())
}

/// Generate a random jitter duration up to the specified maximum seconds.
pub fn random_jitter(max_secs: u64) -> Duration {
    if max_secs > 0 {
        Duration::from_millis(rand::rng().random_range(0..max_secs * 1000))
    } else {
        Duration::ZERO
    }
}
