//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." (every developer at 3am) 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - `source_config`: where rows come from (`Csv`, `InMemory`)
//! - `sink_config`: where batches go (`Firehose`, `File`, `InMemory`)
//! - `runtime`: batch size, byte budget, queue depth, trailing flush, failure policy,
//!   record format, progress bar. The knobs the old simulator script hardcoded.
//! - Backend configs live next to their backends (`backends::*`). This file only wires
//!   them into the enums.

use anyhow::{Context, bail};
use serde::Deserialize;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::Path;
use tracing::{info, warn};

use crate::backends::file::FileSinkConfig;
use crate::backends::firehose::{FIREHOSE_MAX_BATCH_BYTES, FIREHOSE_MAX_BATCH_RECORDS, FirehoseSinkConfig};
use crate::backends::in_mem::{InMemorySinkConfig, InMemorySourceConfig};
use crate::backends::tabular::CsvSourceConfig;
use crate::encoder::RecordFormat;

/// 📦 The AppConfig: one struct to rule them all.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where the rows come from.
    pub source_config: SourceConfig,
    /// 🚰 Where the batches go.
    pub sink_config: SinkConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 🚰 Source selection. One variant per backend, config co-located with the backend.
#[derive(Debug, Deserialize, Clone)]
pub enum SourceConfig {
    Csv(CsvSourceConfig),
    InMemory(InMemorySourceConfig),
}

/// 🕳️ Sink selection.
#[derive(Debug, Deserialize, Clone)]
pub enum SinkConfig {
    Firehose(FirehoseSinkConfig),
    File(FileSinkConfig),
    InMemory(InMemorySinkConfig),
}

/// 💥 What to do when a batch can't be delivered.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// 🛑 First undeliverable batch ends the run with an error.
    #[default]
    Abort,
    /// 🚶 Log it, count it, keep going with the next batch.
    Continue,
}

/// ⚙️ Pipeline knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// 📦 Max records per submission. The old simulator hardcoded 128.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// 📏 Max encoded bytes per submission.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// 🧵 Batches buffered between the reader and the sender.
    #[serde(default = "default_queue_capacity", alias = "channel_size")]
    pub queue_capacity: usize,
    /// 🏁 Send the final partial batch. `false` reproduces the legacy trailing-row loss.
    #[serde(default = "default_flush_trailing_batch")]
    pub flush_trailing_batch: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub record_format: RecordFormat,
    /// 📊 Draw the progress bar (only ever drawn on a terminal anyway).
    #[serde(default = "default_progress")]
    pub progress: bool,
}

fn default_batch_size() -> usize {
    128
}

// 📏 4 MiB: the PutRecordBatch per-call ceiling. Not a vibe, a quota.
fn default_max_batch_bytes() -> usize {
    FIREHOSE_MAX_BATCH_BYTES
}

fn default_queue_capacity() -> usize {
    4
}

fn default_flush_trailing_batch() -> bool {
    true
}

fn default_progress() -> bool {
    true
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_batch_bytes: default_max_batch_bytes(),
            queue_capacity: default_queue_capacity(),
            flush_trailing_batch: default_flush_trailing_batch(),
            failure_policy: FailurePolicy::default(),
            record_format: RecordFormat::default(),
            progress: default_progress(),
        }
    }
}

/// 🎛️ Last-word overrides, usually from CLI flags. `None` = leave it alone.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub batch_size: Option<usize>,
    pub destination_name: Option<String>,
    pub flush_trailing_batch: Option<bool>,
}

impl AppConfig {
    /// 🎛️ Apply overrides on top of whatever figment produced.
    ///
    /// `destination_name` only means something to a Firehose sink; for any other sink it
    /// is ignored with a warning rather than an error.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(batch_size) = overrides.batch_size {
            self.runtime.batch_size = batch_size;
        }
        if let Some(flush) = overrides.flush_trailing_batch {
            self.runtime.flush_trailing_batch = flush;
        }
        if let Some(name) = overrides.destination_name {
            match &mut self.sink_config {
                SinkConfig::Firehose(firehose) => firehose.destination_name = name,
                _ => warn!(
                    "⚠️ --destination-name '{}' ignored: the configured sink is not a Firehose stream",
                    name
                ),
            }
        }
    }

    /// 🔍 Reject configs that would fail halfway through a run.
    pub fn validate(&self) -> anyhow::Result<()> {
        let runtime = &self.runtime;
        if runtime.batch_size == 0 {
            bail!("💀 runtime.batch_size must be at least 1. A batch of nothing is still nothing.");
        }
        if runtime.max_batch_bytes == 0 {
            bail!("💀 runtime.max_batch_bytes must be at least 1.");
        }
        if runtime.queue_capacity == 0 {
            bail!("💀 runtime.queue_capacity must be at least 1. The channel needs somewhere to sit.");
        }
        if let SinkConfig::Firehose(firehose) = &self.sink_config {
            if firehose.destination_name.trim().is_empty() {
                bail!("💀 sink_config.Firehose.destination_name is empty. Which stream, though?");
            }
            if runtime.batch_size > FIREHOSE_MAX_BATCH_RECORDS {
                bail!(
                    "💀 runtime.batch_size {} exceeds the PutRecordBatch limit of {} records",
                    runtime.batch_size,
                    FIREHOSE_MAX_BATCH_RECORDS
                );
            }
            if runtime.max_batch_bytes > FIREHOSE_MAX_BATCH_BYTES {
                warn!(
                    "⚠️ runtime.max_batch_bytes {} is above the Firehose per-call limit of {}; \
                     large batches will be refused",
                    runtime.max_batch_bytes, FIREHOSE_MAX_BATCH_BYTES
                );
            }
        }
        Ok(())
    }
}

/// 🚀 Load the config from env vars (`PLUME_*`, nested keys split on `__`) and an
/// optional TOML file. TOML wins on conflicts.
///
/// 📐 If `config_file_name` is None → env vars only. No file, no assumptions.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("PLUME_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (PLUME_*). \
             The file exists in our hearts, but apparently not in a shape serde recognizes.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (PLUME_*). \
                 No file was provided, so this one's all on the environment."
            .to_string(),
    };

    let app_config: AppConfig = config.extract().context(context_msg)?;
    app_config
        .validate()
        .context("💀 The configuration parsed, but it doesn't make sense")?;
    Ok(app_config)
}
