//! drift: buffered delivery of log chunks into Amazon Redshift via S3.
//!
//! This library takes batches of buffered log records ("chunks"), normalizes
//! them into schema-ordered delimited text, gzips them into a temporary
//! artifact, uploads that artifact to a collision-free time-bucketed S3 key,
//! and bulk-loads it into Redshift with a COPY statement. Load failures
//! caused by bad source data are classified and discarded; everything else
//! propagates so the buffering layer can retry the chunk.
//!
//! # Example
//!
//! ```ignore
//! use drift::{Chunk, Config, RedshiftSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), drift::DeliveryError> {
//!     let config = Config::from_file("config.yaml")?;
//!     let sink = RedshiftSink::new(config)?;
//!     let outcome = sink.write_chunk(Chunk::new("web", payload)).await?;
//!     println!("processed: {}", outcome.is_processed());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod chunk;
pub mod config;
pub mod delivery;
pub mod encode;
pub mod error;
pub mod metrics;
pub mod spool;
pub mod storage;
pub mod warehouse;

// Re-export main types
pub use chunk::Chunk;
pub use config::Config;
pub use delivery::{DeliveryOutcome, RedshiftSink};
pub use error::DeliveryError;
pub use storage::ObjectUploader;
