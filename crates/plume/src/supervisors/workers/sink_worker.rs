//! 🎬 *[a channel fills with batches. somewhere, a Firehose waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 🗑️ The SinkWorker: drains the channel, encodes each batch, hands the payload to the
//! sink, and keeps score. Patient, tireless, and deeply unbothered by the chaos upstream.
//!
//! When a batch doesn't make it, the [`FailurePolicy`] decides: `abort` closes the sink
//! and ends the run, `continue` writes it down and moves on to the next batch.

use anyhow::{Context, Result, anyhow};
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::app_config::FailurePolicy;
use crate::backends::{Sink, SinkBackend};
use crate::common::{Batch, PartialDelivery};
use crate::encoder::{Encoder, EncoderBackend};

/// 📊 What the sender side saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(in crate::supervisors) struct SinkReport {
    pub(in crate::supervisors) records_submitted: u64,
    pub(in crate::supervisors) records_failed: u64,
    pub(in crate::supervisors) batches_submitted: u64,
    pub(in crate::supervisors) batches_failed: u64,
    pub(in crate::supervisors) retries: u64,
}

#[derive(Debug)]
pub(in crate::supervisors) struct SinkWorker {
    rx: Receiver<Batch>,
    sink: SinkBackend,
    encoder: EncoderBackend,
    failure_policy: FailurePolicy,
}

impl SinkWorker {
    pub(in crate::supervisors) fn new(
        rx: Receiver<Batch>,
        sink: SinkBackend,
        encoder: EncoderBackend,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            rx,
            sink,
            encoder,
            failure_policy,
        }
    }

    /// 📡 Encode and send one batch, updating the scoreboard. `Err` only when the
    /// policy says this failure ends the run.
    async fn deliver(&mut self, batch: Batch, report: &mut SinkReport) -> Result<()> {
        let sequence = batch.sequence;
        let outcome = match self.encoder.encode_batch(&batch) {
            Ok(payload) => self
                .sink
                .send(&payload)
                .await
                .with_context(|| format!("💀 Batch {} ({} records) was not delivered", sequence, batch.len())),
            Err(err) => Err(err.context(format!("💀 Batch {} couldn't be encoded", sequence))),
        };

        match outcome {
            Ok(delivery) => {
                report.records_submitted += delivery.accepted as u64;
                report.retries += u64::from(delivery.retries());
                if delivery.is_complete() {
                    report.batches_submitted += 1;
                    debug!(
                        "✅ batch {}: {} records accepted ({} attempts)",
                        sequence, delivery.accepted, delivery.attempts
                    );
                    return Ok(());
                }
                report.records_failed += delivery.failed as u64;
                report.batches_failed += 1;
                self.on_failure(anyhow!(
                    "💀 Batch {}: {} of {} records were still refused after {} attempts",
                    sequence,
                    delivery.failed,
                    batch.len(),
                    delivery.attempts
                ))
                .await
            }
            Err(err) => {
                match err.downcast_ref::<PartialDelivery>() {
                    Some(partial) => {
                        report.records_submitted += partial.delivery.accepted as u64;
                        report.records_failed += partial.delivery.failed as u64;
                        report.retries += u64::from(partial.delivery.retries());
                    }
                    None => report.records_failed += batch.len() as u64,
                }
                report.batches_failed += 1;
                self.on_failure(err).await
            }
        }
    }

    async fn on_failure(&mut self, err: anyhow::Error) -> Result<()> {
        match self.failure_policy {
            FailurePolicy::Continue => {
                warn!("⚠️ {:#}. failure_policy = continue, moving on.", err);
                Ok(())
            }
            FailurePolicy::Abort => {
                if let Err(close_err) = self.sink.close().await {
                    warn!("⚠️ Sink didn't close cleanly while aborting: {:#}", close_err);
                }
                Err(err)
            }
        }
    }
}

impl Worker for SinkWorker {
    type Output = SinkReport;

    fn start(mut self) -> JoinHandle<Result<SinkReport>> {
        tokio::spawn(async move {
            debug!("📥 SinkWorker started draining channel...");
            let mut report = SinkReport::default();
            // -- 🏁 recv errors only once the channel is empty and the source closed it
            while let Ok(batch) = self.rx.recv().await {
                debug!("🪣 SinkWorker received batch {} of {} records", batch.sequence, batch.len());
                self.deliver(batch, &mut report).await?;
            }
            debug!("🏁 SinkWorker: channel closed. Shutting down.");
            self.sink
                .close()
                .await
                .context("💀 SinkWorker failed to close the sink")?;
            Ok(report)
        })
    }
}
