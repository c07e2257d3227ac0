//! Shared fixtures for spillway integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sluice_core::GlobalConfig;
use sluice_core::PipelineContext;
use sluice_core::error::WarehouseError;
use sluice_core::storage::StorageProvider;
use sluice_core::warehouse::{Statement, StatementKind, Warehouse};
use spillway::{Workflow, WorkflowConfig, WorkflowKey};

pub const FILE: &str = "global_health_data_2025-04-27.csv";

/// A warehouse that records statements and answers discovery from a script.
#[derive(Default)]
pub struct ScriptedWarehouse {
    categories: Vec<Option<String>>,
    failures: Mutex<Vec<(String, u32)>>,
    statements: Mutex<Vec<Statement>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedWarehouse {
    pub fn with_categories<'a>(categories: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|c| c.map(str::to_string))
                .collect(),
            ..Default::default()
        }
    }

    /// Fail the next `times` statements whose SQL contains `needle`.
    pub fn failing(self, needle: &str, times: u32) -> Self {
        self.failures
            .lock()
            .unwrap()
            .push((needle.to_string(), times));
        self
    }

    /// Hold every DDL statement open for `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql_containing(&self, needle: &str) -> Vec<String> {
        self.statements()
            .into_iter()
            .filter(|s| s.sql.contains(needle))
            .map(|s| s.sql)
            .collect()
    }

    pub fn position(&self, needle: &str) -> Option<usize> {
        self.statements().iter().position(|s| s.sql.contains(needle))
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, statement: &Statement) -> Result<(), WarehouseError> {
        self.statements.lock().unwrap().push(statement.clone());

        let mut failures = self.failures.lock().unwrap();
        for (needle, remaining) in failures.iter_mut() {
            if *remaining > 0 && statement.sql.contains(needle.as_str()) {
                *remaining -= 1;
                return Err(WarehouseError::Backend {
                    message: format!("scripted failure for {needle}"),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    async fn execute(&self, statement: &Statement) -> Result<(), WarehouseError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero()
            && matches!(
                statement.kind,
                StatementKind::CreateTable | StatementKind::CreateView
            )
        {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.record(statement);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn query_strings(
        &self,
        statement: &Statement,
        _column: &str,
    ) -> Result<Vec<Option<String>>, WarehouseError> {
        self.record(statement)?;
        Ok(self.categories.clone())
    }
}

/// Workflow config pointing at `dir/FILE`, with a one-second gate.
pub fn workflow_config(dir: &Path) -> WorkflowConfig {
    let yaml = format!(
        r#"
source:
  url: {}/{FILE}
sensor:
  timeout_secs: 1
  poke_interval_secs: 1
warehouse:
  project_id: analytics-prod
load:
  staging_table: analytics-prod.staging_data.global_data
derived:
  table_dataset: reporting
"#,
        dir.display()
    );
    serde_yaml::from_str(&yaml).unwrap()
}

pub fn global(retries: u32, max_parallel_jobs: Option<usize>) -> GlobalConfig {
    GlobalConfig {
        retries,
        retry_delay_secs: 0,
        max_parallel_jobs,
        poll_jitter_secs: 0,
    }
}

pub async fn workflow(
    config: &WorkflowConfig,
    warehouse: Arc<ScriptedWarehouse>,
    global: &GlobalConfig,
    shutdown: CancellationToken,
) -> Workflow {
    let (storage, object) =
        StorageProvider::for_object_url(&config.source.url, HashMap::new())
            .await
            .unwrap();
    Workflow::new(
        WorkflowKey::new("health"),
        config,
        Arc::new(storage),
        object,
        warehouse,
        PipelineContext::new(global, shutdown),
    )
    .unwrap()
}

pub fn stage_file(dir: &Path) {
    std::fs::write(
        dir.join(FILE),
        b"Country,Disease Name\nIndia,Malaria\nU.S.A!,Influenza\n",
    )
    .unwrap();
}
