use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{file, firehose, in_mem};
use crate::common::{Delivery, Payload};

/// 🕳️ A sink that delivers encoded payloads. Pure I/O, zero batching logic.
///
/// Sinks only know how to get a payload to its destination: PutRecordBatch over HTTPS,
/// a file write, a Vec push. Batching and encoding happen upstream in the workers.
///
/// # Contract 📜
/// - `send` delivers every document in the payload as one submission and reports how
///   it went. A sink MAY retry internally; the `Delivery` says how many attempts it took
///   and how many records were still refused at the end.
/// - `Err` means the submission as a whole failed (transport, auth, bad stream name).
/// - `close` flushes and releases. MUST be called. Skipping it is a bug, and also rude.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    async fn send(&mut self, payload: &Payload) -> Result<Delivery>;
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink. Mirrors `SourceBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    InMemory(in_mem::InMemorySink),
    File(file::FileSink),
    Firehose(firehose::FirehoseSink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, payload: &Payload) -> Result<Delivery> {
        match self {
            SinkBackend::InMemory(sink) => sink.send(payload).await,
            SinkBackend::File(sink) => sink.send(payload).await,
            SinkBackend::Firehose(sink) => sink.send(payload).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::InMemory(sink) => sink.close().await,
            SinkBackend::File(sink) => sink.close().await,
            SinkBackend::Firehose(sink) => sink.close().await,
        }
    }
}
