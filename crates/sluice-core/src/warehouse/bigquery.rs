//! Google BigQuery implementation of [`Warehouse`].
//!
//! Statements are submitted through `jobs.query`. When BigQuery returns
//! before the job finishes, `jobs.getQueryResults` is polled until it
//! reports completion or the configured budget runs out, so callers can
//! rely on a statement having taken effect once `execute` returns.

use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::get_query_results_parameters::GetQueryResultsParameters;
use gcp_bigquery_client::model::get_query_results_response::GetQueryResultsResponse;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::query_request::QueryRequest;
use gcp_bigquery_client::model::query_response::QueryResponse;
use gcp_bigquery_client::model::table_row::TableRow;
use gcp_bigquery_client::model::table_schema::TableSchema;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::emit;
use crate::error::{ClientInitSnafu, StatementSnafu, WarehouseError};
use crate::metrics::events::{RequestStatus, WarehouseStatement, WarehouseStatementDuration};

use super::{Statement, Warehouse};

/// Connection settings for BigQuery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BigQueryConfig {
    /// Project that runs (and is billed for) the jobs.
    pub project_id: String,
    /// Job location, e.g. "US" or "asia-south1".
    #[serde(default)]
    pub location: Option<String>,
    /// Service account key file; Application Default Credentials otherwise.
    #[serde(default)]
    pub credentials_file: Option<String>,
    /// How long to wait for a single statement to complete.
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

fn default_query_timeout_secs() -> u64 {
    60
}

/// BigQuery client handle. Construct once per workflow and share.
pub struct BigQueryWarehouse {
    client: Client,
    config: BigQueryConfig,
}

impl std::fmt::Debug for BigQueryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BigQueryWarehouse<{}>", self.config.project_id)
    }
}

/// One page of results, from either `jobs.query` or `jobs.getQueryResults`.
struct ResultPage {
    complete: bool,
    job: Option<JobReference>,
    schema: Option<TableSchema>,
    rows: Vec<TableRow>,
    page_token: Option<String>,
}

impl From<QueryResponse> for ResultPage {
    fn from(response: QueryResponse) -> Self {
        Self {
            complete: response.job_complete.unwrap_or(false),
            job: response.job_reference,
            schema: response.schema,
            rows: response.rows.unwrap_or_default(),
            page_token: response.page_token,
        }
    }
}

impl From<GetQueryResultsResponse> for ResultPage {
    fn from(response: GetQueryResultsResponse) -> Self {
        Self {
            complete: response.job_complete.unwrap_or(false),
            job: response.job_reference,
            schema: response.schema,
            rows: response.rows.unwrap_or_default(),
            page_token: response.page_token,
        }
    }
}

impl BigQueryWarehouse {
    /// Build a client from a key file or Application Default Credentials.
    pub async fn connect(config: BigQueryConfig) -> Result<Self, WarehouseError> {
        let client = match &config.credentials_file {
            Some(path) => {
                debug!(path = %path, "Creating BigQuery client from service account key file");
                Client::from_service_account_key_file(path)
                    .await
                    .context(ClientInitSnafu)?
            }
            None => Client::from_application_default_credentials()
                .await
                .context(ClientInitSnafu)?,
        };

        info!(project = %config.project_id, "BigQuery client ready");
        Ok(Self { client, config })
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.query_timeout_secs)
    }

    /// Submit a statement and wait until BigQuery reports the job complete.
    async fn run(&self, statement: &Statement) -> Result<(JobReference, ResultPage), WarehouseError> {
        let kind = statement.kind.as_str();
        let start = Instant::now();
        let deadline = start + self.timeout();

        let result = self.submit_and_wait(statement, deadline).await;

        let status = if result.is_ok() {
            RequestStatus::Success
        } else {
            RequestStatus::Error
        };
        emit!(WarehouseStatement { kind, status });
        emit!(WarehouseStatementDuration {
            kind,
            duration: start.elapsed(),
        });

        result
    }

    async fn submit_and_wait(
        &self,
        statement: &Statement,
        deadline: Instant,
    ) -> Result<(JobReference, ResultPage), WarehouseError> {
        let kind = statement.kind.as_str();

        let mut request = QueryRequest::new(statement.sql.clone());
        request.location = self.config.location.clone();
        request.timeout_ms = Some(remaining_ms(deadline));

        debug!(kind, sql = %statement.sql, "Submitting statement");
        let response = self
            .client
            .job()
            .query(&self.config.project_id, request)
            .await
            .context(StatementSnafu { kind })?;

        let mut page = ResultPage::from(response);
        let job = page.job.clone().unwrap_or_default();
        let job_id = job.job_id.clone().unwrap_or_default();

        while !page.complete {
            if Instant::now() >= deadline || job_id.is_empty() {
                return Err(WarehouseError::Incomplete {
                    kind,
                    job_id,
                    timeout_secs: self.config.query_timeout_secs,
                });
            }

            debug!(kind, job_id = %job_id, "Statement still running, polling for completion");
            let params = GetQueryResultsParameters {
                location: job.location.clone().or_else(|| self.config.location.clone()),
                timeout_ms: Some(remaining_ms(deadline)),
                ..Default::default()
            };
            page = self
                .client
                .job()
                .get_query_results(&self.config.project_id, &job_id, params)
                .await
                .context(StatementSnafu { kind })?
                .into();
        }

        Ok((job, page))
    }

    /// Fetch every remaining page after the first.
    async fn remaining_rows(
        &self,
        statement: &Statement,
        job: &JobReference,
        mut page_token: Option<String>,
        rows: &mut Vec<TableRow>,
    ) -> Result<(), WarehouseError> {
        let kind = statement.kind.as_str();
        let job_id = job.job_id.clone().unwrap_or_default();

        while let Some(token) = page_token.take() {
            let params = GetQueryResultsParameters {
                location: job.location.clone().or_else(|| self.config.location.clone()),
                page_token: Some(token),
                ..Default::default()
            };
            let page: ResultPage = self
                .client
                .job()
                .get_query_results(&self.config.project_id, &job_id, params)
                .await
                .context(StatementSnafu { kind })?
                .into();
            rows.extend(page.rows);
            page_token = page.page_token;
        }
        Ok(())
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn execute(&self, statement: &Statement) -> Result<(), WarehouseError> {
        self.run(statement).await?;
        Ok(())
    }

    async fn query_strings(
        &self,
        statement: &Statement,
        column: &str,
    ) -> Result<Vec<Option<String>>, WarehouseError> {
        let (job, page) = self.run(statement).await?;

        let index = column_index(page.schema.as_ref(), column).context(
            crate::error::MissingColumnSnafu {
                column: column.to_string(),
            },
        )?;

        let mut rows = page.rows;
        self.remaining_rows(statement, &job, page.page_token, &mut rows)
            .await?;

        Ok(rows.iter().map(|row| cell_string(row, index)).collect())
    }
}

fn remaining_ms(deadline: Instant) -> i32 {
    let remaining = deadline.saturating_duration_since(Instant::now()).as_millis();
    i32::try_from(remaining).unwrap_or(i32::MAX)
}

fn column_index(schema: Option<&TableSchema>, column: &str) -> Option<usize> {
    schema?
        .fields
        .as_ref()?
        .iter()
        .position(|field| field.name == column)
}

fn cell_string(row: &TableRow, index: usize) -> Option<String> {
    let value = row.columns.as_ref()?.get(index)?.value.as_ref()?;
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gcp_bigquery_client::model::field_type::FieldType;
    use gcp_bigquery_client::model::table_cell::TableCell;
    use gcp_bigquery_client::model::table_field_schema::TableFieldSchema;

    fn row(values: Vec<serde_json::Value>) -> TableRow {
        TableRow {
            columns: Some(
                values
                    .into_iter()
                    .map(|value| TableCell { value: Some(value) })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_column_index() {
        let schema = TableSchema::new(vec![
            TableFieldSchema::new("year", FieldType::Int64),
            TableFieldSchema::new("country", FieldType::String),
        ]);
        assert_eq!(column_index(Some(&schema), "country"), Some(1));
        assert_eq!(column_index(Some(&schema), "missing"), None);
        assert_eq!(column_index(None, "country"), None);
    }

    #[test]
    fn test_cell_string() {
        let r = row(vec![
            serde_json::Value::String("India".to_string()),
            serde_json::Value::Null,
            serde_json::json!(true),
        ]);
        assert_eq!(cell_string(&r, 0).as_deref(), Some("India"));
        assert_eq!(cell_string(&r, 1), None);
        assert_eq!(cell_string(&r, 2).as_deref(), Some("true"));
        assert_eq!(cell_string(&r, 3), None);
    }

    #[test]
    fn test_config_defaults() {
        let config: BigQueryConfig = serde_yaml::from_str("project_id: analytics").unwrap();
        assert_eq!(config.project_id, "analytics");
        assert_eq!(config.query_timeout_secs, 60);
        assert!(config.location.is_none());
        assert!(config.credentials_file.is_none());
    }
}
