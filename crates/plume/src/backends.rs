//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Source backends pour the rows, Sink backends ship the payloads.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need rows from a CSV? Rows from a TOML fixture?
//! Need them shipped to a Firehose stream, a local file, or a Vec in a test?
//! We've got a backend for that.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;

use crate::app_config::{SinkConfig, SourceConfig};

pub(crate) mod file;
pub(crate) mod firehose;
pub(crate) mod in_mem;
pub(crate) mod tabular;
mod sink;
mod source;

pub(crate) use sink::{Sink, SinkBackend};
pub(crate) use source::{Source, SourceBackend};

impl SourceBackend {
    /// 🏗️ Build the configured source. `show_progress` decides whether sources that can
    /// report progress (the CSV one) draw a bar.
    pub(crate) async fn from_config(config: &SourceConfig, show_progress: bool) -> Result<Self> {
        Ok(match config {
            SourceConfig::Csv(csv) => {
                SourceBackend::Csv(tabular::CsvSource::new(csv.clone(), show_progress).await?)
            }
            SourceConfig::InMemory(rows) => {
                SourceBackend::InMemory(in_mem::InMemorySource::from_config(rows.clone()))
            }
        })
    }
}

impl SinkBackend {
    /// 🏗️ Build the configured sink. The Firehose one resolves region and credentials here,
    /// so a missing region blows up before the first row is read, not after.
    pub(crate) async fn from_config(config: &SinkConfig) -> Result<Self> {
        Ok(match config {
            SinkConfig::Firehose(firehose) => {
                SinkBackend::Firehose(firehose::FirehoseSink::new(firehose.clone()).await?)
            }
            SinkConfig::File(file) => SinkBackend::File(file::FileSink::new(file.clone()).await?),
            SinkConfig::InMemory(in_mem) => {
                SinkBackend::InMemory(in_mem::InMemorySink::from_config(in_mem.clone()))
            }
        })
    }
}
