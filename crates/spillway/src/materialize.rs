//! Creates the table and view for one category.

use sluice_core::error::WarehouseError;
use sluice_core::warehouse::Warehouse;
use tracing::debug;

use crate::jobs::CategoryJob;

/// Run the job's table statement, then its view statement.
///
/// Both statements replace existing objects. If the view statement fails
/// the table is left in place.
pub async fn materialize(
    warehouse: &dyn Warehouse,
    job: &CategoryJob,
) -> Result<String, WarehouseError> {
    warehouse.execute(&job.table_statement).await?;
    debug!(category = %job.category, table = %job.table, "Created table");

    warehouse.execute(&job.view_statement).await?;
    debug!(category = %job.category, view = %job.view, "Created view");

    Ok(format!("Created table and view for {}", job.identifier))
}
