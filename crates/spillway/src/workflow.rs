//! The workflow state machine.
//!
//! `WaitForFile -> Load -> Discover -> Plan -> fan-out -> Complete`. The
//! prefix runs strictly in order; each step is retried under the global
//! policy. The fan-out runs one task per category, optionally bounded by a
//! shared semaphore, and every task runs to completion even if others fail.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use object_store::path::Path;
use snafu::prelude::*;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use sluice_core::emit;
use sluice_core::metrics::events::{CategoriesDiscovered, StepStatus, WorkflowCompleted};
use sluice_core::storage::{StorageProvider, StorageProviderRef};
use sluice_core::warehouse::{BigQueryWarehouse, WarehouseRef};
use sluice_core::{Pipeline, PipelineContext, StepError};

use crate::config::{WorkflowConfig, WorkflowKey};
use crate::discovery::Discovery;
use crate::error::{ConnectSnafu, GateError, PlanSnafu, SourceSnafu, WorkflowError};
use crate::jobs::{CategoryJob, JobTemplate};
use crate::load::BulkLoader;
use crate::materialize::materialize;
use crate::sensor::ExistenceGate;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of distinct categories discovered.
    pub categories: usize,
    /// Identifiers whose table and view were created, sorted.
    pub created: Vec<String>,
}

/// Runs steps under the global retry policy and maps their failures.
struct StepRunner<'a> {
    context: &'a PipelineContext,
    target: &'a str,
}

impl StepRunner<'_> {
    async fn run_step<T, E, F, Fut>(
        &self,
        step: &'static str,
        wrap: impl FnOnce(E) -> WorkflowError,
        attempt: F,
    ) -> Result<T, WorkflowError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_step_if(step, |_| true, wrap, attempt).await
    }

    /// Errors rejected by `retryable` fail the step without further attempts.
    async fn run_step_if<T, E, F, Fut>(
        &self,
        step: &'static str,
        retryable: impl Fn(&E) -> bool,
        wrap: impl FnOnce(E) -> WorkflowError,
        attempt: F,
    ) -> Result<T, WorkflowError>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        info!(target = %self.target, step, "Starting step");
        match self
            .context
            .retry
            .run_if(step, self.target, &self.context.shutdown, retryable, attempt)
            .await
        {
            Ok(value) => Ok(value),
            Err(StepError::Cancelled) => Err(WorkflowError::Cancelled { step }),
            Err(StepError::Failed { source, .. }) => Err(wrap(source)),
        }
    }
}

/// One configured workflow, ready to run.
pub struct Workflow {
    key: WorkflowKey,
    gate: ExistenceGate,
    loader: BulkLoader,
    discovery: Discovery,
    template: JobTemplate,
    warehouse: WarehouseRef,
    context: PipelineContext,
}

impl Workflow {
    /// Assemble a workflow from already-constructed clients.
    pub fn new(
        key: WorkflowKey,
        config: &WorkflowConfig,
        storage: StorageProviderRef,
        object: Path,
        warehouse: WarehouseRef,
        context: PipelineContext,
    ) -> Result<Self, WorkflowError> {
        let staging = config.load.staging_table.clone();

        let template = JobTemplate::new(
            config.warehouse.project_id.as_str(),
            staging.clone(),
            &config.partition_column,
            &config.derived,
            config.on_collision,
        )
        .context(PlanSnafu)?;

        let loader = BulkLoader::new(storage.object_url(&object), config.load.clone());
        let discovery = Discovery::new(staging, config.partition_column.as_str());
        let gate = ExistenceGate::new(
            storage,
            object,
            config.sensor.poke_interval(),
            config.sensor.timeout(),
            key.to_string(),
        );

        Ok(Self {
            key,
            gate,
            loader,
            discovery,
            template,
            warehouse,
            context,
        })
    }

    /// Build the storage and BigQuery clients from config.
    pub async fn connect(
        key: WorkflowKey,
        config: &WorkflowConfig,
        context: PipelineContext,
    ) -> Result<Self, WorkflowError> {
        let url = &config.source.url;
        let (storage, object) =
            StorageProvider::for_object_url(url, config.source.storage_options.clone())
                .await
                .context(SourceSnafu { url: url.clone() })?;

        let warehouse = BigQueryWarehouse::connect(config.warehouse.clone())
            .await
            .context(ConnectSnafu)?;

        Self::new(
            key,
            config,
            Arc::new(storage),
            object,
            Arc::new(warehouse),
            context,
        )
    }

    pub fn key(&self) -> &WorkflowKey {
        &self.key
    }

    /// Run the workflow once, from waiting on the file to completion.
    pub async fn run(&self) -> Result<RunReport, WorkflowError> {
        let result = self.run_steps().await;

        let status = match &result {
            Ok(_) => StepStatus::Success,
            Err(WorkflowError::Cancelled { .. }) => StepStatus::Cancelled,
            Err(_) => StepStatus::Failed,
        };
        emit!(WorkflowCompleted {
            status,
            target: self.key.to_string(),
        });

        result
    }

    async fn run_steps(&self) -> Result<RunReport, WorkflowError> {
        let target = self.key.to_string();
        let steps = StepRunner {
            context: &self.context,
            target: &target,
        };
        let warehouse = self.warehouse.as_ref();

        info!(target = %target, "Waiting for {}", self.gate.object_url());
        // The gate's own timeout is final; only failed storage checks retry.
        steps
            .run_step_if(
                "wait_for_file",
                GateError::is_retryable,
                |source| WorkflowError::Gate { source },
                |_| self.gate.wait(&self.context.shutdown),
            )
            .await?;

        steps
            .run_step(
                "load",
                |source| WorkflowError::Load { source },
                |_| self.loader.load(warehouse),
            )
            .await?;

        let categories = steps
            .run_step(
                "discover",
                |source| WorkflowError::Discover { source },
                |_| self.discovery.discover(warehouse),
            )
            .await?;
        emit!(CategoriesDiscovered {
            count: categories.len() as u64,
            target: target.clone(),
        });

        let jobs = self.template.plan(&categories).context(PlanSnafu)?;
        info!(target = %target, jobs = jobs.len(), "Planned category jobs");

        let report = self.fan_out(jobs).await?;
        self.complete(&report);
        Ok(report)
    }

    /// Run every category job, each under its own retries.
    async fn fan_out(&self, jobs: Vec<CategoryJob>) -> Result<RunReport, WorkflowError> {
        let total = jobs.len();
        let mut tasks: JoinSet<(CategoryJob, Result<String, StepError<_>>)> = JoinSet::new();

        for job in jobs {
            let warehouse = Arc::clone(&self.warehouse);
            let semaphore = self.context.job_semaphore.clone();
            let shutdown = self.context.shutdown.clone();
            let retry = self.context.retry;
            let target = self.key.to_string();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => {
                        match shutdown.run_until_cancelled(semaphore.acquire_owned()).await {
                            Some(Ok(permit)) => Some(permit),
                            _ => return (job, Err(StepError::Cancelled)),
                        }
                    }
                    None => None,
                };

                let result = retry
                    .run("materialize", &target, &shutdown, |_| {
                        materialize(warehouse.as_ref(), &job)
                    })
                    .await;
                (job, result)
            });
        }

        let mut created = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut cancelled = false;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((job, Ok(message))) => {
                    info!(target = %self.key, category = %job.category, "{message}");
                    created.push(job.identifier);
                }
                Ok((job, Err(StepError::Cancelled))) => {
                    warn!(target = %self.key, category = %job.category, "Category job cancelled");
                    cancelled = true;
                    failed.push(job.identifier);
                }
                Ok((job, Err(StepError::Failed { attempts, source }))) => {
                    error!(
                        target = %self.key,
                        category = %job.category,
                        attempts,
                        error = %source,
                        "Category job failed"
                    );
                    failed.push(job.identifier);
                }
                Err(e) => {
                    error!(target = %self.key, error = %e, "Category job panicked");
                    failed.push("<panicked>".to_string());
                }
            }
        }

        if cancelled {
            return Err(WorkflowError::Cancelled {
                step: "materialize",
            });
        }
        if !failed.is_empty() {
            failed.sort();
            warn!(
                target = %self.key,
                failed = failed.len(),
                "Completion marker not reached"
            );
            return Err(WorkflowError::JobsFailed { failed, total });
        }

        created.sort();
        Ok(RunReport {
            categories: total,
            created,
        })
    }

    /// Terminal step, reached only when every category job succeeded.
    fn complete(&self, report: &RunReport) {
        info!(
            target = %self.key,
            categories = report.categories,
            "All category jobs succeeded, workflow complete"
        );
    }
}

/// Runs one workflow as a component of the spillway process.
pub struct WorkflowPipeline {
    key: WorkflowKey,
    config: WorkflowConfig,
    context: PipelineContext,
}

impl WorkflowPipeline {
    pub fn new(key: WorkflowKey, config: WorkflowConfig, context: PipelineContext) -> Self {
        Self {
            key,
            config,
            context,
        }
    }
}

impl Pipeline for WorkflowPipeline {
    type Key = WorkflowKey;
    type Error = WorkflowError;

    fn key(&self) -> &WorkflowKey {
        &self.key
    }

    async fn run(self) -> Result<(), WorkflowError> {
        let workflow = Workflow::connect(self.key, &self.config, self.context).await?;
        let report = workflow.run().await?;
        info!(
            target = %workflow.key(),
            categories = report.categories,
            created = report.created.len(),
            "Workflow finished"
        );
        Ok(())
    }
}
