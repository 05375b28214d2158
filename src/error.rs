//! Error types for drift using snafu.
//!
//! One error enum per domain, aggregated by [`DeliveryError`]. Recoverable
//! conditions (bad records, absent tables, empty archives) are not errors at
//! all; they surface as log lines and skip results in the delivery pipeline.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadFile { source: std::io::Error },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// S3 bucket is empty.
    #[snafu(display("Storage bucket cannot be empty"))]
    EmptyBucket,

    /// Redshift host is empty.
    #[snafu(display("Redshift host cannot be empty"))]
    EmptyHost,

    /// No destination table name and tag routing is disabled.
    #[snafu(display("redshift.tablename is required when tag_as_table is off"))]
    MissingTableName,
}

// ============ Storage Errors ============

/// Errors that can occur during object storage operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StorageError {
    /// S3 client configuration error.
    #[snafu(display("S3 configuration error"))]
    S3Config { source: object_store::Error },

    /// Object store operation failed.
    #[snafu(display("Storage operation failed"))]
    ObjectStore { source: object_store::Error },
}

// ============ Archive Errors ============

/// Errors that can occur while building the compressed archive.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ArchiveError {
    /// Could not create the temporary artifact.
    #[snafu(display("Failed to create temporary archive file"))]
    TempFile { source: std::io::Error },

    /// Gzip write failed.
    #[snafu(display("Failed to write compressed archive"))]
    Compress { source: std::io::Error },

    /// Could not read the finished artifact back for upload.
    #[snafu(display("Failed to read archive artifact"))]
    ReadArtifact { source: std::io::Error },
}

// ============ Warehouse Errors ============

/// Errors from Redshift connections and statements.
///
/// Everything here is fatal to the current delivery attempt; the ignorable
/// load-error case is not an error but a successful
/// [`CopyOutcome::SourceRejected`](crate::warehouse::CopyOutcome) result.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum WarehouseError {
    /// Could not open a connection.
    #[snafu(display("Failed to connect to redshift"))]
    Connect { source: sqlx::Error },

    /// Catalog query for table columns failed.
    #[snafu(display("Failed to fetch table columns from redshift"))]
    ColumnQuery { source: sqlx::Error },

    /// Catalog query for table existence failed.
    #[snafu(display("Failed to check table existence"))]
    TableQuery { source: sqlx::Error },

    /// Catalog query for schema existence failed.
    #[snafu(display("Failed to check schema existence"))]
    SchemaQuery { source: sqlx::Error },

    /// DDL statement failed.
    #[snafu(display("DDL statement failed"))]
    Ddl { source: sqlx::Error },

    /// COPY failed for a reason other than rejected source data.
    #[snafu(display("COPY statement failed"))]
    Copy { source: sqlx::Error },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Failed to bind the metrics listener.
    #[snafu(display("Failed to bind metrics server"))]
    Bind { source: std::io::Error },
}

// ============ Delivery Error (top-level) ============

/// Top-level delivery errors that aggregate all error types.
///
/// A `DeliveryError` returned from `write_chunk` means the chunk was not
/// processed and the buffering framework should retry it later.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum DeliveryError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Object storage error.
    #[snafu(display("Storage error"))]
    Storage { source: StorageError },

    /// Archive construction error.
    #[snafu(display("Archive error"))]
    Archive { source: ArchiveError },

    /// Warehouse error.
    #[snafu(display("Warehouse error"))]
    Warehouse { source: WarehouseError },

    /// Blocking task join error.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },
}
