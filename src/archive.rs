//! Compressed archive construction.
//!
//! Consumes a chunk's records in order, gzip-compressing the encoded lines
//! into a named temporary file. The temp file is a scoped resource: dropping
//! it reclaims the storage on every exit path, success or failure. An archive
//! that received zero payload bytes is reported as [`ArchiveOutcome::NoData`]
//! and never uploaded.

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use snafu::prelude::*;
use std::io::Write;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::chunk::Chunk;
use crate::config::RecordFormat;
use crate::emit;
use crate::encode::{LineEncoder, LineOutcome, SkipReason};
use crate::error::{ArchiveError, CompressSnafu, ReadArtifactSnafu, TempFileSnafu};
use crate::metrics::events::{ArchiveCompressionCompleted, RecordSkipped, RecordsEncoded};

/// A finished gzip artifact awaiting upload.
#[derive(Debug)]
pub struct Archive {
    file: NamedTempFile,
    /// Records written into the artifact.
    pub records: usize,
    /// Uncompressed payload bytes written.
    pub uncompressed_bytes: u64,
}

impl Archive {
    /// Read the compressed artifact back for upload.
    pub fn bytes(&self) -> Result<Bytes, ArchiveError> {
        std::fs::read(self.file.path())
            .context(ReadArtifactSnafu)
            .map(Bytes::from)
    }
}

/// Result of consuming a chunk: an artifact, or nothing worth uploading.
#[derive(Debug)]
pub enum ArchiveOutcome {
    Archive(Archive),
    NoData,
}

/// Build an archive from a structured chunk, encoding each record against the
/// destination schema in chunk order. Undecodable records are logged and
/// skipped; a corrupt MessagePack stream abandons the remainder of the chunk.
pub fn build_structured(
    chunk: &Chunk,
    format: RecordFormat,
    encoder: &LineEncoder,
) -> Result<ArchiveOutcome, ArchiveError> {
    if !format.is_structured() {
        return build_raw(chunk);
    }

    let start = Instant::now();
    let mut writer = ArchiveWriter::create()?;

    match format {
        RecordFormat::Msgpack => {
            for record in chunk.decoded_records() {
                match record {
                    Ok(record) => writer.push(encoder.encode_record(&record), &[])?,
                    Err(err) => {
                        warn!(error = %err, "undecodable msgpack record; abandoning chunk remainder");
                        emit!(RecordSkipped {
                            reason: SkipReason::ParseFailure,
                        });
                        break;
                    }
                }
            }
        }
        _ => {
            for payload in chunk.text_records() {
                writer.push(encoder.encode_text(payload), payload)?;
            }
        }
    }

    let outcome = writer.finish()?;
    emit!(ArchiveCompressionCompleted {
        duration: start.elapsed(),
    });
    Ok(outcome)
}

/// Build an archive from a passthrough chunk: the payload is pre-formatted
/// delimited text and streams into the compressor verbatim.
pub fn build_raw(chunk: &Chunk) -> Result<ArchiveOutcome, ArchiveError> {
    if chunk.is_empty() {
        return Ok(ArchiveOutcome::NoData);
    }

    let start = Instant::now();
    let mut writer = ArchiveWriter::create()?;
    writer.write_raw(chunk.payload())?;

    let outcome = writer.finish()?;
    emit!(ArchiveCompressionCompleted {
        duration: start.elapsed(),
    });
    Ok(outcome)
}

/// Incremental gzip writer over a scoped temporary file.
struct ArchiveWriter {
    gz: GzEncoder<NamedTempFile>,
    records: usize,
    uncompressed_bytes: u64,
}

impl ArchiveWriter {
    fn create() -> Result<Self, ArchiveError> {
        let file = NamedTempFile::new().context(TempFileSnafu)?;
        Ok(Self {
            gz: GzEncoder::new(file, Compression::default()),
            records: 0,
            uncompressed_bytes: 0,
        })
    }

    /// Append one encoding outcome, logging suppressions.
    fn push(&mut self, outcome: LineOutcome, payload: &[u8]) -> Result<(), ArchiveError> {
        match outcome {
            LineOutcome::Line(line) => {
                self.gz.write_all(line.as_bytes()).context(CompressSnafu)?;
                self.records += 1;
                self.uncompressed_bytes += line.len() as u64;
            }
            LineOutcome::Skipped(reason) => {
                match reason {
                    SkipReason::ParseFailure => warn!(
                        payload = %preview(payload),
                        "failed to parse record; skipping"
                    ),
                    SkipReason::NoMatchingColumns => warn!(
                        payload = %preview(payload),
                        "no data match for table columns; suppressing line"
                    ),
                }
                emit!(RecordSkipped { reason });
            }
        }
        Ok(())
    }

    fn write_raw(&mut self, payload: &[u8]) -> Result<(), ArchiveError> {
        self.gz.write_all(payload).context(CompressSnafu)?;
        self.records += payload.iter().filter(|&&b| b == b'\n').count();
        self.uncompressed_bytes += payload.len() as u64;
        Ok(())
    }

    fn finish(self) -> Result<ArchiveOutcome, ArchiveError> {
        let file = self.gz.finish().context(CompressSnafu)?;

        if self.uncompressed_bytes == 0 {
            // Dropping the temp file reclaims it.
            return Ok(ArchiveOutcome::NoData);
        }

        emit!(RecordsEncoded {
            count: self.records as u64,
        });
        Ok(ArchiveOutcome::Archive(Archive {
            file,
            records: self.records,
            uncompressed_bytes: self.uncompressed_bytes,
        }))
    }
}

fn preview(payload: &[u8]) -> String {
    const LIMIT: usize = 256;
    let end = payload.len().min(LIMIT);
    String::from_utf8_lossy(&payload[..end]).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use serde_json::json;
    use std::io::Read;

    fn encoder(columns: &[&str]) -> LineEncoder {
        LineEncoder::new(columns.iter().map(|c| c.to_string()).collect(), '\t')
    }

    fn gunzip(archive: &Archive) -> String {
        let bytes = archive.bytes().unwrap();
        let mut decoder = GzDecoder::new(bytes.as_ref());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        out
    }

    #[test]
    fn test_json_chunk_preserves_record_order() {
        let records = vec![
            json!({"seq": "1"}),
            json!({"seq": "2"}),
            json!({"seq": "3"}),
        ];
        let chunk = Chunk::from_records("web", &records, RecordFormat::Json, "log");
        let encoder = encoder(&["seq"]);

        let outcome = build_structured(&chunk, RecordFormat::Json, &encoder).unwrap();
        let ArchiveOutcome::Archive(archive) = outcome else {
            panic!("expected an archive");
        };

        assert_eq!(archive.records, 3);
        assert_eq!(gunzip(&archive), "1\n2\n3\n");
    }

    #[test]
    fn test_bad_records_are_skipped_not_fatal() {
        let chunk = Chunk::new("web", "{\"seq\":\"1\"}\nnot json\n{\"seq\":\"2\"}\n");
        let encoder = encoder(&["seq"]);

        let outcome = build_structured(&chunk, RecordFormat::Json, &encoder).unwrap();
        let ArchiveOutcome::Archive(archive) = outcome else {
            panic!("expected an archive");
        };

        assert_eq!(archive.records, 2);
        assert_eq!(gunzip(&archive), "1\n2\n");
    }

    #[test]
    fn test_all_suppressed_is_no_data() {
        let records = vec![json!({"other": "x"}), json!({"unrelated": "y"})];
        let chunk = Chunk::from_records("web", &records, RecordFormat::Json, "log");
        let encoder = encoder(&["seq"]);

        let outcome = build_structured(&chunk, RecordFormat::Json, &encoder).unwrap();
        assert!(matches!(outcome, ArchiveOutcome::NoData));
    }

    #[test]
    fn test_empty_chunk_is_no_data() {
        let chunk = Chunk::new("web", "");
        let encoder = encoder(&["seq"]);

        let outcome = build_structured(&chunk, RecordFormat::Json, &encoder).unwrap();
        assert!(matches!(outcome, ArchiveOutcome::NoData));

        let outcome = build_raw(&chunk).unwrap();
        assert!(matches!(outcome, ArchiveOutcome::NoData));
    }

    #[test]
    fn test_msgpack_truncation_keeps_complete_prefix() {
        let records = vec![json!({"seq": "1"}), json!({"seq": "2"})];
        let staged = Chunk::from_records("web", &records, RecordFormat::Msgpack, "log");
        let mut payload = staged.payload().to_vec();
        payload.extend_from_slice(&[0xc1]); // reserved marker: never valid msgpack

        let chunk = Chunk::new("web", payload);
        let encoder = encoder(&["seq"]);

        let outcome = build_structured(&chunk, RecordFormat::Msgpack, &encoder).unwrap();
        let ArchiveOutcome::Archive(archive) = outcome else {
            panic!("expected an archive");
        };
        assert_eq!(gunzip(&archive), "1\n2\n");
    }

    #[test]
    fn test_raw_chunk_streams_verbatim() {
        let chunk = Chunk::new("web", "a\tb\nc\td\n");
        let outcome = build_raw(&chunk).unwrap();
        let ArchiveOutcome::Archive(archive) = outcome else {
            panic!("expected an archive");
        };

        assert_eq!(archive.records, 2);
        assert_eq!(gunzip(&archive), "a\tb\nc\td\n");
    }
}
