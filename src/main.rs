//! drift: a standalone loader for spooled log chunks into Redshift.
//!
//! Polls a spool directory for chunk files and runs each through the
//! delivery pipeline. Chunks that fail fatally stay in the spool for the
//! next poll; processed and skipped chunks are removed.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use drift::error::{AddressParseSnafu, ConfigSnafu, DeliveryError, MetricsSnafu};
use drift::spool::Spool;
use drift::{Config, RedshiftSink, metrics};

/// Spooled log chunk to Redshift loader.
#[derive(Parser, Debug)]
#[command(name = "drift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without delivering.
    #[arg(long)]
    dry_run: bool,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), DeliveryError> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("drift starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).await.context(MetricsSnafu)?;
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("  Bucket: {}", config.storage.bucket);
        info!(
            "  Redshift: {}:{}/{}",
            config.redshift.host, config.redshift.port, config.redshift.dbname
        );
        info!(
            "  Destination: schema={} tag_as_table={}",
            config.redshift.schemaname, config.redshift.tag_as_table
        );
        info!("  Format: {:?}", config.format.file_type);
        info!("  Spool: {}", config.spool.dir);
        info!("Configuration is valid");
        return Ok(());
    }

    let spool = Spool::new(&config.spool.dir);
    let poll_interval = Duration::from_secs(config.spool.poll_interval_secs);
    let sink = RedshiftSink::new(config)?;

    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
            _ = ticker.tick() => {
                drain_spool(&spool, &sink).await;
            }
        }
    }

    Ok(())
}

/// Deliver every pending chunk once. Fatal failures keep the chunk file in
/// place so the next poll retries it.
async fn drain_spool(spool: &Spool, sink: &RedshiftSink) {
    let files = match spool.poll() {
        Ok(files) => files,
        Err(err) => {
            error!("failed to poll spool directory: {err}");
            return;
        }
    };

    for path in files {
        let chunk = match spool.load(&path) {
            Ok(chunk) => chunk,
            Err(err) => {
                error!("failed to read chunk file {}: {err}", path.display());
                continue;
            }
        };

        match sink.write_chunk(chunk).await {
            Ok(outcome) => {
                debug!(
                    "chunk {} finished (processed={})",
                    path.display(),
                    outcome.is_processed()
                );
                if let Err(err) = spool.remove(&path) {
                    error!("failed to remove chunk file {}: {err}", path.display());
                }
            }
            Err(err) => {
                error!(
                    "delivery failed for {}; chunk retained for retry: {err}",
                    path.display()
                );
            }
        }
    }
}
