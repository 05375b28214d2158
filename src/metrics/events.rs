//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the delivery
//! pipeline. Events implement the `InternalEvent` trait which records the
//! corresponding Prometheus metric.

use metrics::{counter, histogram};
use std::time::Duration;
use tracing::trace;

use crate::encode::SkipReason;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when records are encoded into an archive.
pub struct RecordsEncoded {
    pub count: u64,
}

impl InternalEvent for RecordsEncoded {
    fn emit(self) {
        trace!(count = self.count, "Records encoded");
        counter!("drift_records_encoded_total").increment(self.count);
    }
}

/// Event emitted when a record is suppressed instead of encoded.
pub struct RecordSkipped {
    pub reason: SkipReason,
}

impl InternalEvent for RecordSkipped {
    fn emit(self) {
        trace!(reason = self.reason.as_str(), "Record skipped");
        counter!("drift_records_skipped_total", "reason" => self.reason.as_str()).increment(1);
    }
}

/// Final status of one chunk delivery attempt.
#[derive(Debug, Clone, Copy)]
pub enum ChunkStatus {
    /// Loaded into the warehouse.
    Delivered,
    /// Load rejected for bad source data; chunk discarded as handled.
    Handled,
    /// Nothing to deliver; chunk intentionally skipped.
    Skipped,
}

impl ChunkStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::Delivered => "delivered",
            ChunkStatus::Handled => "handled",
            ChunkStatus::Skipped => "skipped",
        }
    }
}

/// Event emitted when a chunk delivery attempt completes without error.
pub struct ChunkCompleted {
    pub status: ChunkStatus,
}

impl InternalEvent for ChunkCompleted {
    fn emit(self) {
        trace!(status = self.status.as_str(), "Chunk completed");
        counter!("drift_chunks_total", "status" => self.status.as_str()).increment(1);
    }
}

/// Event emitted when archive compression completes.
pub struct ArchiveCompressionCompleted {
    pub duration: Duration,
}

impl InternalEvent for ArchiveCompressionCompleted {
    fn emit(self) {
        trace!(
            duration_ms = self.duration.as_millis(),
            "Archive compression completed"
        );
        histogram!("drift_archive_compression_duration_seconds")
            .record(self.duration.as_secs_f64());
    }
}

/// Event emitted when an archive upload completes.
pub struct UploadCompleted {
    pub bytes: u64,
    pub duration: Duration,
}

impl InternalEvent for UploadCompleted {
    fn emit(self) {
        trace!(
            bytes = self.bytes,
            duration_ms = self.duration.as_millis(),
            "Upload completed"
        );
        counter!("drift_uploaded_bytes_total").increment(self.bytes);
        histogram!("drift_upload_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted after probing for a free object key.
pub struct KeyProbes {
    pub attempts: u64,
}

impl InternalEvent for KeyProbes {
    fn emit(self) {
        trace!(attempts = self.attempts, "Key probes");
        histogram!("drift_key_probe_attempts").record(self.attempts as f64);
    }
}

/// Event emitted when a COPY statement completes successfully.
pub struct CopyCompleted {
    pub duration: Duration,
}

impl InternalEvent for CopyCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Copy completed");
        histogram!("drift_copy_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when the warehouse rejects the loaded source data.
pub struct CopyRejected;

impl InternalEvent for CopyRejected {
    fn emit(self) {
        trace!("Copy rejected");
        counter!("drift_copy_rejected_total").increment(1);
    }
}

/// Destination object kinds touched by auto-provisioning.
#[derive(Debug, Clone, Copy)]
pub enum ProvisionObject {
    Schema,
    Table,
}

impl ProvisionObject {
    fn as_str(&self) -> &'static str {
        match self {
            ProvisionObject::Schema => "schema",
            ProvisionObject::Table => "table",
        }
    }
}

/// Outcome of one provisioning attempt.
#[derive(Debug, Clone, Copy)]
pub enum ProvisionStatus {
    Created,
    Failed,
}

impl ProvisionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ProvisionStatus::Created => "created",
            ProvisionStatus::Failed => "failed",
        }
    }
}

/// Event emitted when auto-provisioning attempts to create an object.
pub struct ProvisionAttempted {
    pub object: ProvisionObject,
    pub status: ProvisionStatus,
}

impl InternalEvent for ProvisionAttempted {
    fn emit(self) {
        trace!(
            object = self.object.as_str(),
            status = self.status.as_str(),
            "Provision attempted"
        );
        counter!(
            "drift_provision_total",
            "object" => self.object.as_str(),
            "status" => self.status.as_str()
        )
        .increment(1);
    }
}
