//! Object storage upload with collision-free, time-bucketed keys.
//!
//! Each upload computes a key from the current wall-clock time (UTC or local
//! per configuration) under the configured prefix, probes for an unused
//! two-digit sequence suffix starting at 00, and writes the archive there.
//! Nothing is cached between attempts; a retried delivery gets a fresh key.

mod s3;

use bytes::Bytes;
use chrono::{Local, Utc};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use snafu::prelude::*;
use std::sync::Arc;
use std::time::Instant;

use crate::config::StorageConfig;
use crate::emit;
use crate::error::{ObjectStoreSnafu, StorageError};
use crate::metrics::events::{KeyProbes, UploadCompleted};

/// Uploads compressed archives to an object store.
#[derive(Clone)]
pub struct ObjectUploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    time_format: String,
    utc: bool,
}

impl std::fmt::Debug for ObjectUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectUploader<s3://{}/{}>", self.bucket, self.prefix)
    }
}

impl ObjectUploader {
    /// Build an uploader backed by S3 from the storage configuration.
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let store = s3::build_store(config)?;
        Ok(Self::from_store(
            store,
            &config.bucket,
            &config.path,
            &config.timestamp_key_format,
            config.utc,
        ))
    }

    /// Build an uploader over an existing store, for S3-compatible or
    /// in-memory backends.
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        bucket: &str,
        prefix: &str,
        time_format: &str,
        utc: bool,
    ) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            time_format: time_format.to_string(),
            utc,
        }
    }

    /// Upload an archive under a fresh time-bucketed key and return that key.
    pub async fn upload(&self, bytes: Bytes) -> Result<String, StorageError> {
        let timestamp = self.timestamp_key();
        self.upload_at(&timestamp, bytes).await
    }

    /// The `s3://` URI for a key returned by [`upload`](Self::upload).
    pub fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }

    async fn upload_at(&self, timestamp: &str, bytes: Bytes) -> Result<String, StorageError> {
        let key = self.next_free_key(timestamp).await?;

        let start = Instant::now();
        let size = bytes.len() as u64;
        self.store
            .put(&key, PutPayload::from(bytes))
            .await
            .context(ObjectStoreSnafu)?;
        emit!(UploadCompleted {
            bytes: size,
            duration: start.elapsed(),
        });

        Ok(key.to_string())
    }

    /// Probe sequence suffixes upward from 00 until a key is unused.
    async fn next_free_key(&self, timestamp: &str) -> Result<Path, StorageError> {
        let mut sequence: u32 = 0;
        loop {
            let key = Path::from(format!(
                "{}{}_{:02}.gz",
                self.prefix, timestamp, sequence
            ));
            match self.store.head(&key).await {
                Ok(_) => sequence += 1,
                Err(object_store::Error::NotFound { .. }) => {
                    emit!(KeyProbes {
                        attempts: u64::from(sequence) + 1,
                    });
                    return Ok(key);
                }
                Err(source) => return Err(StorageError::ObjectStore { source }),
            }
        }
    }

    fn timestamp_key(&self) -> String {
        if self.utc {
            Utc::now().format(&self.time_format).to_string()
        } else {
            Local::now().format(&self.time_format).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use object_store::memory::InMemory;

    fn uploader(store: Arc<dyn ObjectStore>) -> ObjectUploader {
        ObjectUploader::from_store(
            store,
            "test-bucket",
            "logs/",
            "year=%Y/month=%m/day=%d/hour=%H/%Y%m%d-%H%M",
            true,
        )
    }

    #[test]
    fn test_timestamp_key_expansion() {
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 14, 30, 0).unwrap();
        let formatted = now
            .format("year=%Y/month=%m/day=%d/hour=%H/%Y%m%d-%H%M")
            .to_string();
        assert_eq!(formatted, "year=2026/month=08/day=06/hour=14/20260806-1430");
    }

    #[tokio::test]
    async fn test_first_upload_gets_sequence_zero() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let uploader = uploader(store.clone());

        let key = uploader
            .upload_at("day=01/20260101-0000", Bytes::from_static(b"data"))
            .await
            .unwrap();

        assert_eq!(key, "logs/day=01/20260101-0000_00.gz");
        assert!(store.head(&Path::from(key)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sequence_probing_skips_existing_keys() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        for sequence in 0..5 {
            let key = Path::from(format!("logs/day=01/20260101-0000_{sequence:02}.gz"));
            store
                .put(&key, PutPayload::from(Bytes::from_static(b"existing")))
                .await
                .unwrap();
        }

        let uploader = uploader(store);
        let key = uploader
            .upload_at("day=01/20260101-0000", Bytes::from_static(b"data"))
            .await
            .unwrap();

        assert_eq!(key, "logs/day=01/20260101-0000_05.gz");
    }

    #[tokio::test]
    async fn test_concurrent_timestamps_do_not_collide() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let uploader = uploader(store);

        let first = uploader
            .upload_at("day=01/20260101-0000", Bytes::from_static(b"a"))
            .await
            .unwrap();
        let second = uploader
            .upload_at("day=01/20260101-0000", Bytes::from_static(b"b"))
            .await
            .unwrap();

        assert_ne!(first, second);
        assert_eq!(second, "logs/day=01/20260101-0000_01.gz");
    }

    #[test]
    fn test_object_uri() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let uploader = uploader(store);
        assert_eq!(
            uploader.object_uri("logs/day=01/x_00.gz"),
            "s3://test-bucket/logs/day=01/x_00.gz"
        );
    }
}
