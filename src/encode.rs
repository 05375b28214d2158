//! Delimited line encoding against the destination table schema.
//!
//! Converts one structured record into one schema-ordered delimited text
//! line. Fields are looked up by column name; anything absent or textually
//! empty becomes an empty field, and a record contributing nothing to any
//! column is suppressed entirely rather than loaded as a blank row.

use serde_json::Value;

/// Result of encoding one record.
#[derive(Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// A finished line, delimiter-joined and newline-terminated.
    Line(String),
    /// The record produced no line; the chunk continues without it.
    Skipped(SkipReason),
}

/// Why a record was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The payload did not decode to a structured mapping.
    ParseFailure,
    /// Every schema column came up empty for this record.
    NoMatchingColumns,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::ParseFailure => "parse_failure",
            SkipReason::NoMatchingColumns => "no_matching_columns",
        }
    }
}

/// Encodes records against a fixed, ordered column list.
#[derive(Debug, Clone)]
pub struct LineEncoder {
    columns: Vec<String>,
    delimiter: char,
}

impl LineEncoder {
    pub fn new(columns: Vec<String>, delimiter: char) -> Self {
        Self { columns, delimiter }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Encode a self-describing text payload (one JSON record).
    pub fn encode_text(&self, payload: &[u8]) -> LineOutcome {
        match serde_json::from_slice::<Value>(payload) {
            Ok(record) => self.encode_record(&record),
            Err(_) => LineOutcome::Skipped(SkipReason::ParseFailure),
        }
    }

    /// Encode an already-decoded record mapping.
    pub fn encode_record(&self, record: &Value) -> LineOutcome {
        let Some(fields) = record.as_object() else {
            return LineOutcome::Skipped(SkipReason::ParseFailure);
        };

        let values: Vec<String> = self
            .columns
            .iter()
            .map(|column| field_text(fields.get(column)))
            .collect();

        if values.iter().all(String::is_empty) {
            return LineOutcome::Skipped(SkipReason::NoMatchingColumns);
        }

        let escaped: Vec<String> = values
            .iter()
            .map(|value| {
                if value.is_empty() {
                    String::new()
                } else {
                    escape(value)
                }
            })
            .collect();

        let separator = self.delimiter.to_string();
        LineOutcome::Line(format!("{}\n", escaped.join(&separator)))
    }
}

/// The textual form of one field value. Missing keys, nulls, and empty
/// strings all collapse to the empty field; nested mappings and sequences are
/// re-serialized to their canonical JSON text.
fn field_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(nested @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string(nested).unwrap_or_default()
        }
    }
}

/// Escape a non-empty field value for the ESCAPE load option: backslash is
/// doubled, then tab and newline are prefixed with a backslash. Backslash
/// goes first so inserted escape characters are never re-escaped.
pub fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\t', "\\\t")
        .replace('\n', "\\\n")
}

/// Passthrough encoding: the record's designated text field verbatim plus a
/// newline. No schema lookup, no escaping, no emptiness suppression.
pub fn raw_line(record: &Value, key: &str) -> Option<String> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(|line| format!("{line}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encoder(columns: &[&str]) -> LineEncoder {
        LineEncoder::new(columns.iter().map(|c| c.to_string()).collect(), '\t')
    }

    /// Inverse of `escape`, for the round-trip property only.
    fn unescape(value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut chars = value.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn test_schema_ordered_line_with_empty_padding() {
        let encoder = encoder(&["key_a", "key_b", "key_c", "key_d"]);
        let record = json!({"key_a": "val_a", "key_b": "val_b"});

        let outcome = encoder.encode_record(&record);
        assert_eq!(
            outcome,
            LineOutcome::Line("val_a\tval_b\t\t\n".to_string())
        );

        // Idempotent across repeated runs with the same input.
        assert_eq!(encoder.encode_record(&record), outcome);
    }

    #[test]
    fn test_no_overlap_suppresses_line() {
        let encoder = encoder(&["key_a", "key_b"]);
        let record = json!({"other": "value", "unrelated": 7});

        assert_eq!(
            encoder.encode_record(&record),
            LineOutcome::Skipped(SkipReason::NoMatchingColumns)
        );
    }

    #[test]
    fn test_null_and_empty_string_count_as_empty() {
        let encoder = encoder(&["key_a", "key_b"]);
        let record = json!({"key_a": null, "key_b": ""});

        assert_eq!(
            encoder.encode_record(&record),
            LineOutcome::Skipped(SkipReason::NoMatchingColumns)
        );
    }

    #[test]
    fn test_parse_failure_is_skipped() {
        let encoder = encoder(&["key_a"]);
        assert_eq!(
            encoder.encode_text(b"{not json"),
            LineOutcome::Skipped(SkipReason::ParseFailure)
        );
        // Scalar payloads are not mappings either.
        assert_eq!(
            encoder.encode_text(b"42"),
            LineOutcome::Skipped(SkipReason::ParseFailure)
        );
    }

    #[test]
    fn test_numbers_and_booleans_render_canonically() {
        let encoder = encoder(&["count", "flag"]);
        assert_eq!(
            encoder.encode_record(&json!({"count": 0, "flag": false})),
            LineOutcome::Line("0\tfalse\n".to_string())
        );
    }

    #[test]
    fn test_nested_values_reserialize_as_json() {
        let encoder = encoder(&["meta", "tags"]);
        let record = json!({"meta": {"k": "v"}, "tags": ["a", "b"]});

        assert_eq!(
            encoder.encode_record(&record),
            LineOutcome::Line("{\"k\":\"v\"}\t[\"a\",\"b\"]\n".to_string())
        );
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "a\\b\tc\nd\\\\e";
        let escaped = escape(original);
        assert_eq!(escaped, "a\\\\b\\\tc\\\nd\\\\\\\\e");
        assert_eq!(unescape(&escaped), original);
    }

    #[test]
    fn test_escaped_values_in_line() {
        let encoder = encoder(&["msg"]);
        let record = json!({"msg": "tab\there"});
        assert_eq!(
            encoder.encode_record(&record),
            LineOutcome::Line("tab\\\there\n".to_string())
        );
    }

    #[test]
    fn test_raw_line_is_verbatim() {
        let record = json!({"log": "a\tb\\c", "other": 1});
        assert_eq!(raw_line(&record, "log").unwrap(), "a\tb\\c\n");
        assert!(raw_line(&record, "missing").is_none());
    }
}
