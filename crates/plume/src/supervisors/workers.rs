//! 🧵 Workers: the ones who actually move the readings while the Supervisor takes
//! all the credit in the sprint retro.
//!
//! Two of them, one channel between:
//!
//! ```text
//!   SourceWorker ──(async_channel::bounded<Batch>)──▶ SinkWorker
//!   rows → Batcher → Batch                     Batch → Encoder → Sink::send
//! ```
//!
//! The channel is bounded, so a slow Firehose makes the reader wait instead of
//! buffering the whole CSV in memory. There is exactly one sink worker; batches
//! leave in the order the batcher emitted them. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod sink_worker;
mod source_worker;

pub(super) use sink_worker::{SinkReport, SinkWorker};
pub(super) use source_worker::{SourceReport, SourceWorker};

/// 🏗️ A background worker, that does work. duh.
///
/// `start` consumes the worker and hands back the task handle. The handle resolves to
/// whatever the worker tallied on the way, or the error that stopped it.
pub(super) trait Worker {
    type Output;

    fn start(self) -> JoinHandle<Result<Self::Output>>;
}
