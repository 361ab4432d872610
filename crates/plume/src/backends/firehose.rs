// ai
//! 🔥 The Firehose backend: batches go in, S3 objects come out (eventually, somewhere, managed).
//!
//! 🎬 *[a delivery stream named IotStream waits in us-east-1. it has been waiting for a while.]*
//!
//! 🧠 Knowledge graph:
//! - Talks to Firehose through `aws-sdk-firehose`: one `PutRecordBatch` call per batch.
//!   Region and credentials come from `aws-config`'s provider chain (env, `~/.aws`
//!   profiles, SSO, container and instance roles) unless the config pins them.
//! - `endpoint_url` points the client at LocalStack or a wiremock instead of AWS.
//! - `firehose_sink`: the sink itself. Inspects per-record results and resubmits only the
//!   records that failed, on an exponential backoff, until the retry budget runs out.
//!
//! ⚠️ Limits are Firehose's, not ours: 500 records and 4 MiB per call.

mod firehose_sink;

pub(crate) use firehose_sink::{FirehoseSink, FirehoseSinkConfig};

/// 📦 PutRecordBatch accepts at most this many records per call.
pub(crate) const FIREHOSE_MAX_BATCH_RECORDS: usize = 500;

/// 📏 PutRecordBatch accepts at most this many bytes of record data per call.
pub(crate) const FIREHOSE_MAX_BATCH_BYTES: usize = 4 * 1024 * 1024;
