//! Data warehouse client abstraction.
//!
//! SQL is the only interface to the warehouse. The [`Warehouse`] trait is the
//! seam between the workflow and the client library: production code uses
//! [`BigQueryWarehouse`], tests substitute a scripted double.

mod bigquery;
mod sql;

pub use bigquery::{BigQueryConfig, BigQueryWarehouse};
pub use sql::{TableName, quote_identifier, quote_string};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::WarehouseError;

/// Shared handle to a warehouse client.
pub type WarehouseRef = Arc<dyn Warehouse>;

/// What a statement does, used for logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Load,
    Query,
    CreateTable,
    CreateView,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Load => "load",
            StatementKind::Query => "query",
            StatementKind::CreateTable => "create_table",
            StatementKind::CreateView => "create_view",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SQL statement ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
}

impl Statement {
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            kind,
            sql: sql.into(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// A warehouse that accepts SQL statements.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run a statement to completion, discarding any result rows.
    async fn execute(&self, statement: &Statement) -> Result<(), WarehouseError>;

    /// Run a query to completion and return one column of every result row.
    ///
    /// NULL cells are returned as `None`.
    async fn query_strings(
        &self,
        statement: &Statement,
        column: &str,
    ) -> Result<Vec<Option<String>>, WarehouseError>;
}
