//! The per-chunk delivery pipeline.
//!
//! One `write_chunk` call runs a chunk through the whole state machine:
//! resolve the destination table, provision it if configured, fetch its
//! schema, encode and compress the records, upload the archive to S3, and
//! execute the COPY. Each invocation owns its temporary artifact, its
//! warehouse connections, and its object key, so concurrent invocations need
//! no coordination.

use snafu::prelude::*;
use std::sync::Arc;
use tokio::task;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::archive::{self, ArchiveOutcome};
use crate::chunk::Chunk;
use crate::config::{Config, RecordFormat};
use crate::emit;
use crate::encode::LineEncoder;
use crate::error::{
    ArchiveSnafu, ConfigError, ConfigSnafu, DeliveryError, StorageSnafu, TaskJoinSnafu,
    WarehouseSnafu,
};
use crate::metrics::events::{ChunkCompleted, ChunkStatus, CopyRejected};
use crate::storage::ObjectUploader;
use crate::warehouse::{CopyOutcome, Redshift, Warehouse, provision};

/// How a chunk delivery attempt ended, short of a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Loaded into the warehouse.
    Delivered,
    /// The warehouse rejected the staged data; the chunk is discarded and
    /// reported processed so the framework does not retry it forever.
    Handled,
    /// Nothing to deliver (absent table, empty chunk, or every record
    /// suppressed); the chunk is intentionally skipped.
    NoData,
}

impl DeliveryOutcome {
    /// The boolean-like signal surfaced to the buffering framework:
    /// processed (true) vs intentionally skipped (false).
    pub fn is_processed(&self) -> bool {
        !matches!(self, DeliveryOutcome::NoData)
    }

    fn status(&self) -> ChunkStatus {
        match self {
            DeliveryOutcome::Delivered => ChunkStatus::Delivered,
            DeliveryOutcome::Handled => ChunkStatus::Handled,
            DeliveryOutcome::NoData => ChunkStatus::Skipped,
        }
    }
}

/// Buffered sink delivering chunks into Redshift via S3.
#[derive(Debug)]
pub struct RedshiftSink<W = Redshift> {
    config: Arc<Config>,
    uploader: ObjectUploader,
    warehouse: W,
}

impl RedshiftSink {
    /// Build a sink from configuration, with the S3 client and the sqlx
    /// Redshift client it implies.
    pub fn new(config: Config) -> Result<Self, DeliveryError> {
        let config = Arc::new(config);
        let uploader = ObjectUploader::new(&config.storage).context(StorageSnafu)?;
        let warehouse = Redshift::new(&config);
        Ok(Self::with_warehouse(config, uploader, warehouse))
    }
}

impl<W: Warehouse> RedshiftSink<W> {
    /// Build a sink over explicit collaborators.
    pub fn with_warehouse(config: Arc<Config>, uploader: ObjectUploader, warehouse: W) -> Self {
        Self {
            config,
            uploader,
            warehouse,
        }
    }

    /// The warehouse client backing this sink.
    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    /// Deliver one chunk. A returned error is fatal for this attempt and the
    /// caller is expected to retry the whole chunk later.
    pub async fn write_chunk(&self, chunk: Chunk) -> Result<DeliveryOutcome, DeliveryError> {
        let span = info_span!(
            "chunk",
            tag = %chunk.tag(),
            suffix = %self.config.log_suffix
        );
        let outcome = self.deliver(chunk).instrument(span).await?;
        emit!(ChunkCompleted {
            status: outcome.status(),
        });
        Ok(outcome)
    }

    async fn deliver(&self, chunk: Chunk) -> Result<DeliveryOutcome, DeliveryError> {
        let format = self.config.format.file_type;
        let table = self.destination_table(chunk.tag())?;

        if format.is_structured() {
            self.deliver_structured(chunk, format, &table).await
        } else {
            self.deliver_raw(chunk, &table).await
        }
    }

    /// Structured formats are re-encoded against the live table definition;
    /// an absent table skips the chunk before anything is staged.
    async fn deliver_structured(
        &self,
        chunk: Chunk,
        format: RecordFormat,
        table: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        if self.config.redshift.auto_create_table {
            if let Some(fields) = chunk.sample_fields(format) {
                provision::ensure_destination(&self.warehouse, &self.config.redshift, table, &fields)
                    .await;
            }
        }

        let columns = self
            .warehouse
            .fetch_table_columns(table)
            .await
            .context(WarehouseSnafu)?;
        let Some(columns) = columns else {
            warn!(table, "no destination table on redshift; skipping chunk");
            return Ok(DeliveryOutcome::NoData);
        };

        let encoder = LineEncoder::new(columns, self.config.format.delimiter());
        let outcome = task::spawn_blocking(move || archive::build_structured(&chunk, format, &encoder))
            .await
            .context(TaskJoinSnafu)?
            .context(ArchiveSnafu)?;

        self.upload_and_load(outcome, table).await
    }

    /// Passthrough formats stream the pre-formatted chunk bytes as-is; no
    /// schema lookup is involved.
    async fn deliver_raw(&self, chunk: Chunk, table: &str) -> Result<DeliveryOutcome, DeliveryError> {
        let outcome = task::spawn_blocking(move || archive::build_raw(&chunk))
            .await
            .context(TaskJoinSnafu)?
            .context(ArchiveSnafu)?;

        self.upload_and_load(outcome, table).await
    }

    async fn upload_and_load(
        &self,
        outcome: ArchiveOutcome,
        table: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let archive = match outcome {
            ArchiveOutcome::Archive(archive) => archive,
            ArchiveOutcome::NoData => {
                debug!("received no loadable data; skipping chunk");
                return Ok(DeliveryOutcome::NoData);
            }
        };

        let bytes = archive.bytes().context(ArchiveSnafu)?;
        let key = self.uploader.upload(bytes).await.context(StorageSnafu)?;
        let uri = self.uploader.object_uri(&key);
        debug!(uri = %uri, records = archive.records, "uploaded archive; starting copy");

        match self
            .warehouse
            .copy_into(table, &uri)
            .await
            .context(WarehouseSnafu)?
        {
            CopyOutcome::Loaded => Ok(DeliveryOutcome::Delivered),
            CopyOutcome::SourceRejected { message } => {
                error!(uri = %uri, error = %message, "redshift rejected the load; discarding chunk");
                emit!(CopyRejected);
                Ok(DeliveryOutcome::Handled)
            }
        }
    }

    /// The destination table for a chunk: its routing tag up to the first
    /// `.` when tag routing is on, the configured name otherwise.
    fn destination_table(&self, tag: &str) -> Result<String, DeliveryError> {
        let redshift = &self.config.redshift;
        if redshift.tag_as_table {
            return Ok(tag.split('.').next().unwrap_or(tag).to_string());
        }
        redshift
            .tablename
            .clone()
            .ok_or(ConfigError::MissingTableName)
            .context(ConfigSnafu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn test_config() -> Config {
        serde_yaml::from_str(
            r#"
storage:
  bucket: test-bucket
  aws_key_id: AKIATEST
  aws_sec_key: secret
redshift:
  host: localhost
  dbname: test
  user: test
  password: test
format:
  file_type: json
"#,
        )
        .unwrap()
    }

    fn sink(config: Config) -> RedshiftSink {
        let config = Arc::new(config);
        let uploader = ObjectUploader::from_store(
            Arc::new(InMemory::new()),
            "test-bucket",
            "",
            "%Y%m%d-%H%M",
            true,
        );
        let warehouse = Redshift::new(&config);
        RedshiftSink::with_warehouse(config, uploader, warehouse)
    }

    #[test]
    fn test_tag_routing_strips_after_first_dot() {
        let sink = sink(test_config());
        assert_eq!(
            sink.destination_table("web.access.2026").unwrap(),
            "web"
        );
        assert_eq!(sink.destination_table("events").unwrap(), "events");
    }

    #[test]
    fn test_fixed_table_name() {
        let mut config = test_config();
        config.redshift.tag_as_table = false;
        config.redshift.tablename = Some("events".to_string());

        let sink = sink(config);
        assert_eq!(sink.destination_table("web.access").unwrap(), "events");
    }

    #[test]
    fn test_missing_table_name_is_config_error() {
        let mut config = test_config();
        config.redshift.tag_as_table = false;
        config.redshift.tablename = None;

        let sink = sink(config);
        assert!(matches!(
            sink.destination_table("web"),
            Err(DeliveryError::Config {
                source: ConfigError::MissingTableName
            })
        ));
    }

    #[test]
    fn test_outcome_signal_mapping() {
        assert!(DeliveryOutcome::Delivered.is_processed());
        assert!(DeliveryOutcome::Handled.is_processed());
        assert!(!DeliveryOutcome::NoData.is_processed());
    }
}
