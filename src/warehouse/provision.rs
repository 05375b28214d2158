//! Best-effort destination provisioning.
//!
//! Creates a missing destination table (and, when configured, its schema)
//! from the field names observed in one sample record. Concurrent delivery
//! attempts may race to create the same object; the warehouse's own
//! uniqueness enforcement decides the winner, so every creation failure here
//! is logged and swallowed. This pass is advisory and never changes the
//! delivery outcome.

use tracing::{error, info};

use crate::config::RedshiftConfig;
use crate::emit;
use crate::metrics::events::{ProvisionAttempted, ProvisionObject, ProvisionStatus};

use super::{Warehouse, sql};

/// Ensure a destination table exists for the given column set.
///
/// No-op when the table already exists or when the column set is empty.
pub async fn ensure_destination<W: Warehouse>(
    warehouse: &W,
    config: &RedshiftConfig,
    table: &str,
    columns: &[String],
) {
    match warehouse.table_exists(table).await {
        Ok(true) => return,
        Ok(false) => {}
        Err(err) => {
            error!(table, error = %err, "table existence check failed; skipping auto-create");
            return;
        }
    }

    if columns.is_empty() {
        return;
    }

    if config.schemaname != "public" {
        ensure_schema(warehouse, &config.schemaname).await;
    }

    let statement =
        sql::create_table_statement(&config.schemaname, table, columns, config.varchar_length);
    match warehouse.execute_ddl(&statement).await {
        Ok(()) => {
            info!(table, statement, "created destination table");
            emit!(ProvisionAttempted {
                object: ProvisionObject::Table,
                status: ProvisionStatus::Created,
            });
        }
        Err(err) => {
            error!(table, error = %err, "CREATE TABLE failed");
            emit!(ProvisionAttempted {
                object: ProvisionObject::Table,
                status: ProvisionStatus::Failed,
            });
        }
    }
}

async fn ensure_schema<W: Warehouse>(warehouse: &W, schema: &str) {
    match warehouse.schema_exists(schema).await {
        Ok(true) => return,
        Ok(false) => {}
        Err(err) => {
            error!(schema, error = %err, "schema existence check failed; skipping auto-create");
            return;
        }
    }

    match warehouse.execute_ddl(&sql::create_schema_statement(schema)).await {
        Ok(()) => {
            info!(schema, "created destination schema");
            emit!(ProvisionAttempted {
                object: ProvisionObject::Schema,
                status: ProvisionStatus::Created,
            });
        }
        Err(err) => {
            error!(schema, error = %err, "CREATE SCHEMA failed");
            emit!(ProvisionAttempted {
                object: ProvisionObject::Schema,
                status: ProvisionStatus::Failed,
            });
        }
    }
}
