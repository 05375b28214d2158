//! Chunk model and record iteration.
//!
//! A chunk is one batch handed over by the buffering layer: a routing tag
//! plus an ordered, opaque payload of serialized records. How the payload is
//! walked depends on the configured [`RecordFormat`]: newline-delimited JSON
//! text, concatenated MessagePack mappings, or pre-formatted delimited lines
//! that pass through untouched.

use bytes::Bytes;
use serde_json::Value;
use std::io::{Cursor, Write};

use crate::config::RecordFormat;
use crate::encode;

/// One batch of buffered records for a single delivery attempt.
#[derive(Debug, Clone)]
pub struct Chunk {
    tag: String,
    payload: Bytes,
}

impl Chunk {
    pub fn new(tag: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            tag: tag.into(),
            payload: payload.into(),
        }
    }

    /// Stage records into a chunk payload the way the buffering layer's
    /// format step does: structured formats serialize each record whole,
    /// passthrough formats emit only the designated text field per record.
    pub fn from_records(
        tag: impl Into<String>,
        records: &[Value],
        format: RecordFormat,
        record_log_key: &str,
    ) -> Self {
        let mut payload = Vec::new();
        for record in records {
            match format {
                RecordFormat::Json => {
                    if let Ok(line) = serde_json::to_vec(record) {
                        payload.extend_from_slice(&line);
                        payload.push(b'\n');
                    }
                }
                RecordFormat::Msgpack => {
                    let _ = rmp_serde::encode::write_named(&mut payload, record);
                }
                RecordFormat::Tsv | RecordFormat::Csv => {
                    if let Some(line) = encode::raw_line(record, record_log_key) {
                        let _ = payload.write_all(line.as_bytes());
                    }
                }
            }
        }
        Self::new(tag, payload)
    }

    /// The routing tag assigned by the buffering layer.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The raw payload, used verbatim by passthrough formats.
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Iterate text records: one JSON payload per non-empty line.
    pub fn text_records(&self) -> impl Iterator<Item = &[u8]> {
        self.payload
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
    }

    /// Iterate pre-decoded records from a MessagePack payload.
    pub fn decoded_records(&self) -> MsgpackRecords<'_> {
        MsgpackRecords {
            cursor: Cursor::new(self.payload.as_ref()),
        }
    }

    /// Field names observed in the first decodable record, used to derive
    /// columns for auto-created tables. `None` when no record decodes to a
    /// mapping.
    pub fn sample_fields(&self, format: RecordFormat) -> Option<Vec<String>> {
        let first = match format {
            RecordFormat::Json => self
                .text_records()
                .find_map(|line| serde_json::from_slice::<Value>(line).ok()),
            RecordFormat::Msgpack => self.decoded_records().find_map(Result::ok),
            RecordFormat::Tsv | RecordFormat::Csv => None,
        };
        first
            .as_ref()
            .and_then(Value::as_object)
            .map(|fields| fields.keys().cloned().collect())
    }
}

/// Iterator over concatenated MessagePack values.
///
/// Stops at the end of the payload; a decode error is yielded once and the
/// caller is expected to abandon the remainder, since the stream cannot be
/// resynchronized past a corrupt value.
pub struct MsgpackRecords<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl Iterator for MsgpackRecords<'_> {
    type Item = Result<Value, rmp_serde::decode::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.position() >= self.cursor.get_ref().len() as u64 {
            return None;
        }
        Some(rmp_serde::decode::from_read(&mut self.cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_records_skip_blank_lines() {
        let chunk = Chunk::new("web", "{\"a\":1}\n\n{\"b\":2}\n");
        let records: Vec<_> = chunk.text_records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], b"{\"a\":1}");
    }

    #[test]
    fn test_msgpack_roundtrip_preserves_order() {
        let records = vec![json!({"seq": 1}), json!({"seq": 2}), json!({"seq": 3})];
        let chunk = Chunk::from_records("web", &records, RecordFormat::Msgpack, "log");

        let decoded: Vec<Value> = chunk.decoded_records().map(Result::unwrap).collect();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_msgpack_truncated_payload_yields_error() {
        let records = vec![json!({"seq": 1})];
        let chunk = Chunk::from_records("web", &records, RecordFormat::Msgpack, "log");
        let mut truncated = chunk.payload().to_vec();
        truncated.pop();

        let chunk = Chunk::new("web", truncated);
        let mut iter = chunk.decoded_records();
        assert!(iter.next().unwrap().is_err());
    }

    #[test]
    fn test_sample_fields_from_first_decodable_record() {
        let chunk = Chunk::new("web", "not json\n{\"user\":\"kay\",\"action\":\"login\"}\n");
        let mut fields = chunk.sample_fields(RecordFormat::Json).unwrap();
        fields.sort();
        assert_eq!(fields, vec!["action", "user"]);
    }

    #[test]
    fn test_sample_fields_absent_for_passthrough() {
        let chunk = Chunk::new("web", "a\tb\n");
        assert!(chunk.sample_fields(RecordFormat::Tsv).is_none());
    }

    #[test]
    fn test_passthrough_staging_extracts_log_field() {
        let records = vec![
            json!({"log": "alpha\tbeta", "ignored": 1}),
            json!({"log": "gamma\tdelta"}),
        ];
        let chunk = Chunk::from_records("web", &records, RecordFormat::Tsv, "log");
        assert_eq!(chunk.payload().as_ref(), b"alpha\tbeta\ngamma\tdelta\n");
    }
}
