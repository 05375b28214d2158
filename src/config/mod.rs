//! Configuration parsing and validation.
//!
//! Handles loading configuration from YAML files with environment variable
//! interpolation, normalizing the S3 key prefix, and resolving the record
//! delimiter from the configured file type.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{
    ConfigError, EmptyBucketSnafu, EmptyHostSnafu, EnvInterpolationSnafu, MissingTableNameSnafu,
    ReadFileSnafu, YamlParseSnafu,
};

/// Main configuration structure for the delivery sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    pub redshift: RedshiftConfig,
    pub format: FormatConfig,
    /// Spool intake for the CLI shell (optional, defaults to ./spool).
    #[serde(default)]
    pub spool: SpoolConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Suffix appended to diagnostic log output, useful when several sinks
    /// share one log stream.
    #[serde(default)]
    pub log_suffix: String,
}

/// S3 upload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub aws_key_id: String,
    pub aws_sec_key: String,
    /// Endpoint override for S3-compatible stores (forces path-style requests).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Region; falls back to the environment when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Key prefix; normalized to end with a single `/` (empty means bucket root).
    #[serde(default)]
    pub path: String,
    /// strftime pattern expanded into the object key from the upload time.
    #[serde(default = "default_timestamp_key_format")]
    pub timestamp_key_format: String,
    /// Format the key timestamp in UTC instead of local time.
    #[serde(default)]
    pub utc: bool,
}

fn default_timestamp_key_format() -> String {
    "year=%Y/month=%m/day=%d/hour=%H/%Y%m%d-%H%M".to_string()
}

/// Redshift connection and destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedshiftConfig {
    pub host: String,
    #[serde(default = "default_redshift_port")]
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Fixed destination table; required unless `tag_as_table` is set.
    #[serde(default)]
    pub tablename: Option<String>,
    #[serde(default = "default_schemaname")]
    pub schemaname: String,
    /// Options appended verbatim to every COPY statement.
    #[serde(default = "default_copy_base_options")]
    pub copy_base_options: String,
    /// Create missing destination tables from observed record fields.
    #[serde(default = "default_true")]
    pub auto_create_table: bool,
    /// Route each chunk to the table named by its tag instead of `tablename`.
    #[serde(default = "default_true")]
    pub tag_as_table: bool,
    /// Column width for auto-created tables.
    #[serde(default = "default_varchar_length")]
    pub varchar_length: u32,
}

fn default_redshift_port() -> u16 {
    5439
}

fn default_schemaname() -> String {
    "public".to_string()
}

fn default_copy_base_options() -> String {
    "FILLRECORD ACCEPTANYDATE TRUNCATECOLUMNS".to_string()
}

fn default_true() -> bool {
    true
}

fn default_varchar_length() -> u32 {
    255
}

/// Record format configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatConfig {
    pub file_type: RecordFormat,
    /// Field delimiter override; defaults to tab (comma for csv).
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Record field holding the pre-formatted line in passthrough modes.
    #[serde(default = "default_record_log_key")]
    pub record_log_key: String,
}

fn default_record_log_key() -> String {
    "log".to_string()
}

impl FormatConfig {
    /// The effective field delimiter for this format.
    pub fn delimiter(&self) -> char {
        self.delimiter.unwrap_or(match self.file_type {
            RecordFormat::Csv => ',',
            _ => '\t',
        })
    }
}

/// Supported chunk record formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// Newline-delimited self-describing JSON records.
    Json,
    /// Concatenated MessagePack mappings.
    Msgpack,
    /// Pre-formatted tab-separated lines, streamed verbatim.
    Tsv,
    /// Pre-formatted comma-separated lines, streamed verbatim.
    Csv,
}

impl RecordFormat {
    /// Structured formats are decoded per record and re-encoded against the
    /// destination schema; the rest pass through untouched.
    pub fn is_structured(&self) -> bool {
        matches!(self, RecordFormat::Json | RecordFormat::Msgpack)
    }
}

/// Spool directory configuration for the CLI shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpoolConfig {
    #[serde(default = "default_spool_dir")]
    pub dir: String,
    /// Interval in seconds between polls for new chunk files.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            dir: default_spool_dir(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_spool_dir() -> String {
    "./spool".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadFileSnafu)?;

        let result = vars::interpolate(&content);
        if !result.is_ok() {
            let message = result.errors.join("\n");
            return EnvInterpolationSnafu { message }.fail();
        }

        let mut config: Config = serde_yaml::from_str(&result.text).context(YamlParseSnafu)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Canonicalize the S3 key prefix: a non-empty prefix always ends with
    /// one `/`, and a bare `/` means the bucket root.
    fn normalize(&mut self) {
        let path = &mut self.storage.path;
        if path == "/" {
            path.clear();
        } else if !path.is_empty() && !path.ends_with('/') {
            path.push('/');
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.storage.bucket.is_empty(), EmptyBucketSnafu);
        ensure!(!self.redshift.host.is_empty(), EmptyHostSnafu);
        ensure!(
            self.redshift.tag_as_table || self.redshift.tablename.is_some(),
            MissingTableNameSnafu
        );
        Ok(())
    }
}
