//! 🌫️ plume: reads sensor rows out of a CSV, batches them, and puts them onto a
//! Firehose delivery stream (or a file, or a Vec, for the days when AWS is someone
//! else's problem).
//!
//! ```text
//!   CSV rows → Record → Batcher → Batch → Encoder → Payload → Sink
//! ```
//!
//! The library surface is small on purpose: load an [`app_config::AppConfig`], hand it
//! to [`run`], read the [`RunSummary`]. 🦆

pub mod app_config;
pub mod batcher;
pub mod common;
pub mod encoder;
pub mod retry;

mod backends;
mod progress;
mod supervisors;

use anyhow::Result;

use crate::app_config::AppConfig;
use crate::supervisors::Supervisor;

pub use crate::common::RunSummary;

/// 🚀 Build the configured source and sink, stream every row through, and report.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    Supervisor::new(app_config).run().await
}
