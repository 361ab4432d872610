//! 🚰 The SourceWorker: reads rows, feeds the batcher, pushes full batches down the
//! channel. When the rows run out it decides what happens to the leftovers.

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::backends::{Source, SourceBackend};
use crate::batcher::Batcher;
use crate::common::Batch;

/// 📊 What the reader side saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(in crate::supervisors) struct SourceReport {
    pub(in crate::supervisors) records_read: u64,
    /// ⚠️ Trailing records left unsent because `flush_trailing_batch = false`.
    pub(in crate::supervisors) records_dropped: u64,
}

#[derive(Debug)]
pub(in crate::supervisors) struct SourceWorker {
    tx: Sender<Batch>,
    source: SourceBackend,
    batcher: Batcher,
    flush_trailing_batch: bool,
}

impl SourceWorker {
    pub(in crate::supervisors) fn new(
        tx: Sender<Batch>,
        source: SourceBackend,
        batcher: Batcher,
        flush_trailing_batch: bool,
    ) -> Self {
        Self {
            tx,
            source,
            batcher,
            flush_trailing_batch,
        }
    }

    async fn ship(&self, batch: Batch) -> Result<()> {
        let sequence = batch.sequence;
        debug!("📤 SourceWorker: batch {} ({} records) → channel", sequence, batch.len());
        self.tx.send(batch).await.with_context(|| {
            format!(
                "💀 SourceWorker couldn't hand off batch {}: the sink worker already hung up",
                sequence
            )
        })
    }
}

impl Worker for SourceWorker {
    type Output = SourceReport;

    fn start(mut self) -> JoinHandle<Result<SourceReport>> {
        tokio::spawn(async move {
            debug!("🚰 SourceWorker started reading...");
            let mut report = SourceReport::default();

            while let Some(record) = self
                .source
                .next_record()
                .await
                .context("💀 SourceWorker couldn't read the next row")?
            {
                report.records_read += 1;
                if let Some(batch) = self.batcher.push(record)? {
                    self.ship(batch).await?;
                }
            }

            match self.batcher.finish() {
                Some(batch) if self.flush_trailing_batch => self.ship(batch).await?,
                Some(batch) => {
                    report.records_dropped = batch.len() as u64;
                    warn!(
                        "⚠️ flush_trailing_batch is off: the last {} records were read and never sent",
                        batch.len()
                    );
                }
                None => {}
            }
            // -- 🏁 closing the channel is how the sink worker learns we're done
            self.tx.close();

            debug!(
                "🏁 SourceWorker: EOF after {} records, {} batches cut",
                report.records_read,
                self.batcher.emitted()
            );
            Ok(report)
        })
    }
}
