//! Redshift warehouse client.
//!
//! The [`Warehouse`] trait is the seam between the delivery pipeline and the
//! warehouse: schema lookup, catalog existence checks, DDL, and the COPY bulk
//! load. [`Redshift`] is the sqlx-backed implementation; every operation opens
//! a fresh connection for the attempt and releases it before returning,
//! whatever the outcome.

pub mod provision;
pub mod sql;

use snafu::prelude::*;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{Connection, Executor};
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, RedshiftConfig};
use crate::emit;
use crate::error::{
    ColumnQuerySnafu, ConnectSnafu, CopySnafu, DdlSnafu, SchemaQuerySnafu, TableQuerySnafu,
    WarehouseError,
};
use crate::metrics::events::CopyCompleted;

/// Result of a COPY execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The load completed.
    Loaded,
    /// Redshift rejected the staged source data; the chunk is discarded
    /// rather than retried.
    SourceRejected { message: String },
}

/// Warehouse operations needed by the delivery pipeline.
#[allow(async_fn_in_trait)]
pub trait Warehouse {
    /// Ordered column names of a destination table, `None` when the table
    /// does not exist.
    async fn fetch_table_columns(&self, table: &str)
    -> Result<Option<Vec<String>>, WarehouseError>;

    /// Whether a table of this name exists anywhere in the database.
    async fn table_exists(&self, table: &str) -> Result<bool, WarehouseError>;

    /// Whether the named schema exists.
    async fn schema_exists(&self, schema: &str) -> Result<bool, WarehouseError>;

    /// Run one DDL statement.
    async fn execute_ddl(&self, statement: &str) -> Result<(), WarehouseError>;

    /// Bulk-load an uploaded object into the destination table.
    async fn copy_into(&self, table: &str, object_uri: &str)
    -> Result<CopyOutcome, WarehouseError>;
}

/// sqlx-backed Redshift client.
#[derive(Debug, Clone)]
pub struct Redshift {
    config: RedshiftConfig,
    aws_key_id: String,
    aws_sec_key: String,
    delimiter: char,
}

impl Redshift {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.redshift.clone(),
            aws_key_id: config.storage.aws_key_id.clone(),
            aws_sec_key: config.storage.aws_sec_key.clone(),
            delimiter: config.format.delimiter(),
        }
    }

    async fn connect(&self) -> Result<PgConnection, WarehouseError> {
        let options = PgConnectOptions::new()
            .host(&self.config.host)
            .port(self.config.port)
            .database(&self.config.dbname)
            .username(&self.config.user)
            .password(&self.config.password);
        PgConnection::connect_with(&options)
            .await
            .context(ConnectSnafu)
    }
}

impl Warehouse for Redshift {
    async fn fetch_table_columns(
        &self,
        table: &str,
    ) -> Result<Option<Vec<String>>, WarehouseError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, String>(sql::FETCH_COLUMNS)
            .bind(table)
            .bind(&self.config.schemaname)
            .fetch_all(&mut conn)
            .await
            .context(ColumnQuerySnafu);
        let _ = conn.close().await;

        let columns = result?;
        debug!(table, columns = columns.len(), "fetched table definition");
        Ok(if columns.is_empty() {
            None
        } else {
            Some(columns)
        })
    }

    async fn table_exists(&self, table: &str) -> Result<bool, WarehouseError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, String>(sql::TABLE_EXISTS)
            .bind(table)
            .fetch_all(&mut conn)
            .await
            .context(TableQuerySnafu);
        let _ = conn.close().await;
        Ok(!result?.is_empty())
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool, WarehouseError> {
        let mut conn = self.connect().await?;
        let result = sqlx::query_scalar::<_, String>(sql::SCHEMA_EXISTS)
            .bind(schema)
            .fetch_all(&mut conn)
            .await
            .context(SchemaQuerySnafu);
        let _ = conn.close().await;
        Ok(!result?.is_empty())
    }

    async fn execute_ddl(&self, statement: &str) -> Result<(), WarehouseError> {
        let mut conn = self.connect().await?;
        let result = conn.execute(statement).await.context(DdlSnafu);
        let _ = conn.close().await;
        result?;
        Ok(())
    }

    async fn copy_into(
        &self,
        table: &str,
        object_uri: &str,
    ) -> Result<CopyOutcome, WarehouseError> {
        let statement = sql::copy_statement(
            &self.config.schemaname,
            table,
            object_uri,
            &self.aws_key_id,
            &self.aws_sec_key,
            self.delimiter,
            &self.config.copy_base_options,
        );

        let start = Instant::now();
        let mut conn = self.connect().await?;
        let result = conn.execute(statement.as_str()).await;
        let _ = conn.close().await;

        match result {
            Ok(_) => {
                emit!(CopyCompleted {
                    duration: start.elapsed(),
                });
                info!(uri = object_uri, table, "completed copying to redshift");
                Ok(CopyOutcome::Loaded)
            }
            Err(err) => {
                if let Some(message) = rejected_source_message(&err) {
                    return Ok(CopyOutcome::SourceRejected { message });
                }
                Err(err).context(CopySnafu)
            }
        }
    }
}

/// The database error message when it matches the rejected-source signature,
/// i.e. the load failed because of the staged data rather than the
/// infrastructure.
fn rejected_source_message(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if sql::is_ignorable_load_error(db.message()) => {
            Some(db.message().to_string())
        }
        _ => None,
    }
}
