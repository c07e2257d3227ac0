//! Distinct category values in the staging table.

use sluice_core::error::WarehouseError;
use sluice_core::warehouse::{Statement, StatementKind, TableName, Warehouse, quote_identifier};
use tracing::{debug, info};

/// Lists the distinct non-NULL values of the partition column.
#[derive(Debug, Clone)]
pub struct Discovery {
    staging: TableName,
    column: String,
}

impl Discovery {
    pub fn new(staging: TableName, column: impl Into<String>) -> Self {
        Self {
            staging,
            column: column.into(),
        }
    }

    pub fn statement(&self) -> Result<Statement, WarehouseError> {
        let column = quote_identifier(&self.column)?;
        let sql = format!(
            "SELECT DISTINCT {column} AS {column} FROM {table} WHERE {column} IS NOT NULL",
            table = self.staging.quoted(),
        );
        Ok(Statement::new(StatementKind::Query, sql))
    }

    /// Run the query. An empty result is valid.
    pub async fn discover(&self, warehouse: &dyn Warehouse) -> Result<Vec<String>, WarehouseError> {
        let values = warehouse
            .query_strings(&self.statement()?, &self.column)
            .await?;

        let total = values.len();
        let categories: Vec<String> = values.into_iter().flatten().collect();
        if categories.len() < total {
            debug!(
                dropped = total - categories.len(),
                "Dropped NULL category values"
            );
        }

        info!(
            table = %self.staging,
            column = %self.column,
            count = categories.len(),
            "Discovered categories"
        );
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement() {
        let discovery = Discovery::new("p.staging_data.global_data".parse().unwrap(), "country");
        assert_eq!(
            discovery.statement().unwrap().sql,
            "SELECT DISTINCT `country` AS `country` FROM `p.staging_data.global_data` \
             WHERE `country` IS NOT NULL"
        );
    }

    #[test]
    fn test_statement_with_spaced_column() {
        let discovery = Discovery::new("p.d.t".parse().unwrap(), "Country Name");
        let sql = discovery.statement().unwrap().sql;
        assert!(sql.starts_with("SELECT DISTINCT `Country Name` AS `Country Name`"));
    }
}
