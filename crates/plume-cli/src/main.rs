//! 🚀 plume-cli: the front door, the bouncer, the maitre d' of plume.
//!
//! 🎬 *[narrator voice]* "It all started with a CSV full of greenhouse temperatures..."
//! 📦 This binary is the thin wrapper that parses flags, loads config, sets up logging,
//! and then lets the library do the heavy lifting. Like a manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, CellAlignment, Table, presets::UTF8_FULL};
use plume::RunSummary;
use plume::app_config::ConfigOverrides;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// 🔧 the ol' reliable
const DEFAULT_CONFIG_FILE: &str = "plume.toml";

/// 🌫️ Stream CSV sensor readings into a Firehose delivery stream, in batches.
#[derive(Debug, Parser)]
#[command(name = "plume", version, about)]
struct Args {
    /// TOML config file. Defaults to ./plume.toml when it exists, otherwise PLUME_* env vars only.
    config: Option<PathBuf>,

    /// Records per submission (overrides runtime.batch_size).
    #[arg(long)]
    batch_size: Option<usize>,

    /// Firehose delivery stream name (overrides sink_config.Firehose.destination_name).
    #[arg(long)]
    destination_name: Option<String>,

    /// Don't send the final partial batch. Reproduces the legacy trailing-row loss.
    #[arg(long)]
    no_trailing_flush: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            batch_size: self.batch_size,
            destination_name: self.destination_name.clone(),
            flush_trailing_batch: self.no_trailing_flush.then_some(false),
        }
    }
}

/// 🔍 An explicit path must exist. The default one is optional.
fn resolve_config_path(explicit: Option<PathBuf>) -> Result<Option<PathBuf>> {
    match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Couldn't check whether '{}' exists", path.display())
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 Configuration file '{}' doesn't exist. If it's a relative path, \
                     check your working directory, or use an absolute path to be absolutely sure.",
                    path.display()
                );
            }
            Ok(Some(path))
        }
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            Ok(default.is_file().then_some(default))
        }
    }
}

fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["📊 metric", "value"]);
    let rows: [(&str, String); 8] = [
        ("records read", summary.records_read.to_string()),
        ("records submitted", summary.records_submitted.to_string()),
        ("records failed", summary.records_failed.to_string()),
        ("records dropped (no trailing flush)", summary.records_dropped.to_string()),
        ("batches submitted", summary.batches_submitted.to_string()),
        ("batches failed", summary.batches_failed.to_string()),
        ("retries", summary.retries.to_string()),
        ("elapsed", format!("{:.2?}", summary.elapsed)),
    ];
    for (metric, value) in rows {
        table.add_row(vec![
            Cell::new(metric),
            Cell::new(value).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

/// 🕵️ Does anything in the chain smell like the endpoint just isn't there?
fn looks_like_connectivity(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        let cause = cause.to_string();
        cause.contains("error sending request")
            || cause.contains("dispatch failure")
            || cause.contains("connection refused")
            || cause.contains("Connection refused")
            || cause.contains("tcp connect error")
            || cause.contains("dns error")
            || cause.contains("never reached")
    })
}

async fn run(args: Args) -> Result<RunSummary> {
    let config_path = resolve_config_path(args.config.clone())?;
    let mut app_config = plume::app_config::load_config(config_path.as_deref())
        .context("💀 Couldn't load the configuration. Check the TOML and the PLUME_* env vars.")?;
    app_config.apply_overrides(args.overrides());
    plume::run(app_config).await
}

#[tokio::main]
async fn main() {
    // 📡 RUST_LOG wins; otherwise info and up
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(summary) => {
            println!("{}", summary_table(&summary));
            if summary.is_lossless() {
                info!("✅ Put records succeeded");
            } else {
                info!(
                    "⚠️ Put records finished with {} failed and {} dropped",
                    summary.records_failed, summary.records_dropped
                );
            }
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
            }
            if looks_like_connectivity(&err) {
                error!(
                    "🔧 hint: the Firehose endpoint isn't reachable. Check the region, \
                     endpoint_url and your network. Running LocalStack? `docker ps` will tell \
                     you whether it's actually up. ☕"
                );
            }
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_flags_become_overrides() {
        let args = Args::parse_from([
            "plume",
            "greenhouse.toml",
            "--batch-size",
            "64",
            "--destination-name",
            "IotStream",
            "--no-trailing-flush",
        ]);
        assert_eq!(args.config, Some(PathBuf::from("greenhouse.toml")));
        let overrides = args.overrides();
        assert_eq!(overrides.batch_size, Some(64));
        assert_eq!(overrides.destination_name.as_deref(), Some("IotStream"));
        assert_eq!(overrides.flush_trailing_batch, Some(false));
    }

    #[test]
    fn the_one_where_no_flags_override_nothing() {
        let overrides = Args::parse_from(["plume"]).overrides();
        assert_eq!(overrides.batch_size, None);
        assert_eq!(overrides.flush_trailing_batch, None);
    }

    #[test]
    fn the_one_where_a_missing_explicit_config_is_an_error() {
        let missing = PathBuf::from("/definitely/not/here/plume.toml");
        assert!(resolve_config_path(Some(missing)).is_err());
    }

    #[test]
    fn the_one_where_connection_refused_earns_a_hint() {
        let err = anyhow::anyhow!("tcp connect error: Connection refused").context("💀 batch 0");
        assert!(looks_like_connectivity(&err));
        assert!(!looks_like_connectivity(&anyhow::anyhow!("ResourceNotFoundException")));
    }

    #[test]
    fn the_one_where_the_summary_table_lists_everything() {
        let summary = RunSummary {
            records_read: 300,
            records_submitted: 300,
            ..RunSummary::default()
        };
        let rendered = summary_table(&summary).to_string();
        assert!(rendered.contains("records read"));
        assert!(rendered.contains("300"));
    }
}
