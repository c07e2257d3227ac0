//! Bulk load of the source CSV into the staging table.

use sluice_core::error::WarehouseError;
use sluice_core::warehouse::{Statement, StatementKind, TableName, Warehouse, quote_string};
use tracing::info;

use crate::config::LoadConfig;

/// Replaces the staging table with the contents of one CSV object.
///
/// The schema is auto-detected on every load and the table is fully
/// overwritten, so re-running a load is idempotent.
#[derive(Debug, Clone)]
pub struct BulkLoader {
    source_uri: String,
    config: LoadConfig,
}

impl BulkLoader {
    pub fn new(source_uri: impl Into<String>, config: LoadConfig) -> Self {
        Self {
            source_uri: source_uri.into(),
            config,
        }
    }

    pub fn staging_table(&self) -> &TableName {
        &self.config.staging_table
    }

    /// The `LOAD DATA OVERWRITE` statement for this load.
    pub fn statement(&self) -> Statement {
        let sql = format!(
            "LOAD DATA OVERWRITE {table}\nFROM FILES (\n  format = 'CSV',\n  uris = [{uri}],\n  \
             skip_leading_rows = {skip},\n  field_delimiter = {delimiter},\n  \
             allow_jagged_rows = {jagged},\n  ignore_unknown_values = {ignore}\n)",
            table = self.config.staging_table.quoted(),
            uri = quote_string(&self.source_uri),
            skip = self.config.skip_leading_rows,
            delimiter = quote_string(&self.config.field_delimiter),
            jagged = self.config.allow_jagged_rows,
            ignore = self.config.ignore_unknown_values,
        );
        Statement::new(StatementKind::Load, sql)
    }

    /// Run the load to completion.
    pub async fn load(&self, warehouse: &dyn Warehouse) -> Result<(), WarehouseError> {
        warehouse.execute(&self.statement()).await?;
        info!(
            table = %self.config.staging_table,
            "Loaded {} into staging table", self.source_uri
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoadConfig {
        serde_yaml::from_str("staging_table: proj.staging_data.global_data").unwrap()
    }

    #[test]
    fn test_statement() {
        let loader = BulkLoader::new(
            "gs://data-engineering/uploads/global_health_data_2025-04-27.csv",
            config(),
        );
        let statement = loader.statement();

        assert_eq!(statement.kind, StatementKind::Load);
        assert_eq!(
            statement.sql,
            "LOAD DATA OVERWRITE `proj.staging_data.global_data`\n\
             FROM FILES (\n  \
             format = 'CSV',\n  \
             uris = ['gs://data-engineering/uploads/global_health_data_2025-04-27.csv'],\n  \
             skip_leading_rows = 1,\n  \
             field_delimiter = ',',\n  \
             allow_jagged_rows = true,\n  \
             ignore_unknown_values = true\n\
             )"
        );
    }

    #[test]
    fn test_statement_has_no_column_list() {
        let sql = BulkLoader::new("gs://b/f.csv", config()).statement().sql;
        assert!(!sql.contains("global_data` ("));
    }

    #[test]
    fn test_uri_is_quoted() {
        let sql = BulkLoader::new("gs://b/it's.csv", config()).statement().sql;
        assert!(sql.contains(r"uris = ['gs://b/it\'s.csv']"));
    }
}
