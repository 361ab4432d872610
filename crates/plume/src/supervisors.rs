//! 🎬 *[camera pans across a dimly lit greenhouse]*
//! 🎬 *[a temperature sensor blinks. 29 degrees. again.]*
//! 🎬 "In a world where rows pile up endlessly..."
//! 🎬 "One supervisor dared to ship them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor module: builds the backends, wires a bounded channel between
//! a reader and a sender, waits for both, and writes up the [`RunSummary`].
//!
//! ⚠️ The workers stay private. Nobody outside this module spawns them.

mod workers;

use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{SinkBackend, SourceBackend};
use crate::batcher::{BatchLimits, Batcher};
use crate::common::{Batch, RunSummary};
use crate::encoder::EncoderBackend;
use workers::{SinkReport, SinkWorker, SourceReport, SourceWorker, Worker};

/// 📦 The Supervisor: hands out the work, then hovers until it's done.
pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🚀 Validate, build the configured backends, run the pipeline.
    pub(crate) async fn run(&self) -> Result<RunSummary> {
        self.app_config.validate()?;
        let source = SourceBackend::from_config(
            &self.app_config.source_config,
            self.app_config.runtime.progress,
        )
        .await
        .context("💀 Couldn't open the source")?;
        let sink = SinkBackend::from_config(&self.app_config.sink_config)
            .await
            .context("💀 Couldn't set up the sink")?;
        self.run_with(source, sink).await
    }

    /// 🧵 Run the pipeline over backends that already exist.
    ///
    /// If both workers fail, the sink's error wins: when the sink aborts, the source
    /// only fails because nobody is listening anymore, and that's not news.
    pub(crate) async fn run_with(
        &self,
        source: SourceBackend,
        sink: SinkBackend,
    ) -> Result<RunSummary> {
        let runtime = &self.app_config.runtime;
        let encoder = EncoderBackend::from_format(runtime.record_format);
        let batcher = Batcher::new(
            BatchLimits {
                max_records: runtime.batch_size,
                max_bytes: runtime.max_batch_bytes,
            },
            encoder,
        )?;
        let (tx, rx) = async_channel::bounded::<Batch>(runtime.queue_capacity);

        info!(
            "🚀 Pipeline starting: batches of up to {} records / {} bytes, queue of {}",
            runtime.batch_size, runtime.max_batch_bytes, runtime.queue_capacity
        );
        let started = Instant::now();

        let source_handle =
            SourceWorker::new(tx, source, batcher, runtime.flush_trailing_batch).start();
        let sink_handle = SinkWorker::new(rx, sink, encoder, runtime.failure_policy).start();
        let (source_joined, sink_joined) = tokio::join!(source_handle, sink_handle);

        let sink_report = sink_joined.context("💀 The sink worker panicked")??;
        let source_report = source_joined.context("💀 The source worker panicked")??;

        let summary = summarize(source_report, sink_report, started);
        info!(
            "🏁 Pipeline finished: {} read, {} submitted, {} failed, {} dropped in {:?}",
            summary.records_read,
            summary.records_submitted,
            summary.records_failed,
            summary.records_dropped,
            summary.elapsed
        );
        Ok(summary)
    }
}

fn summarize(source: SourceReport, sink: SinkReport, started: Instant) -> RunSummary {
    RunSummary {
        records_read: source.records_read,
        records_submitted: sink.records_submitted,
        records_failed: sink.records_failed,
        records_dropped: source.records_dropped,
        batches_submitted: sink.batches_submitted,
        batches_failed: sink.batches_failed,
        retries: sink.retries,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{FailurePolicy, RuntimeConfig, SinkConfig, SourceConfig};
    use crate::backends::file::FileSinkConfig;
    use crate::backends::firehose::{FirehoseSink, FirehoseSinkConfig};
    use crate::backends::in_mem::{
        InMemorySink, InMemorySinkConfig, InMemorySource, InMemorySourceConfig,
    };
    use crate::backends::tabular::CsvSourceConfig;
    use crate::common::{Payload, Record};
    use crate::encoder::RecordFormat;
    use crate::retry::RetryConfig;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn readings(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::from_pairs([("id", json!(i)), ("temp", json!(29))]))
            .collect()
    }

    fn supervisor(runtime: RuntimeConfig) -> Supervisor {
        Supervisor::new(AppConfig {
            source_config: SourceConfig::InMemory(InMemorySourceConfig::default()),
            sink_config: SinkConfig::InMemory(InMemorySinkConfig::default()),
            runtime,
        })
    }

    fn runtime(batch_size: usize, flush_trailing_batch: bool) -> RuntimeConfig {
        RuntimeConfig {
            batch_size,
            flush_trailing_batch,
            progress: false,
            ..RuntimeConfig::default()
        }
    }

    async fn run_over(
        runtime: RuntimeConfig,
        records: Vec<Record>,
        sink: InMemorySink,
    ) -> Result<RunSummary> {
        supervisor(runtime)
            .run_with(
                SourceBackend::InMemory(InMemorySource::new(records)),
                SinkBackend::InMemory(sink),
            )
            .await
    }

    async fn batch_sizes(sink: &InMemorySink) -> Vec<usize> {
        sink.received.lock().await.iter().map(Payload::len).collect()
    }

    #[tokio::test]
    async fn the_one_where_every_reading_makes_it_in_order() -> Result<()> {
        let sink = InMemorySink::new();
        let summary = run_over(runtime(128, true), readings(300), sink.clone()).await?;

        assert_eq!(batch_sizes(&sink).await, vec![128, 128, 44]);
        let received = sink.received.lock().await;
        let sequences: Vec<u64> = received.iter().map(|p| p.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);

        let ids: Vec<u64> = received
            .iter()
            .flat_map(|p| p.documents.iter())
            .map(|doc| {
                let value: serde_json::Value = serde_json::from_str(doc).unwrap();
                value["id"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(ids, (0..300).collect::<Vec<u64>>());
        assert!(received.iter().flat_map(|p| &p.documents).all(|d| d.ends_with('\n')));

        assert_eq!(summary.records_read, 300);
        assert_eq!(summary.records_submitted, 300);
        assert_eq!(summary.batches_submitted, 3);
        assert!(summary.is_lossless());
        assert!(sink.is_closed().await);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_legacy_gap_drops_the_tail() -> Result<()> {
        let sink = InMemorySink::new();
        let summary = run_over(runtime(128, false), readings(300), sink.clone()).await?;

        assert_eq!(batch_sizes(&sink).await, vec![128, 128]);
        assert_eq!(summary.records_read, 300);
        assert_eq!(summary.records_submitted, 256);
        assert_eq!(summary.records_dropped, 44);
        assert!(!summary.is_lossless());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_short_file_fits_in_one_batch_or_none() -> Result<()> {
        let flushed = InMemorySink::new();
        run_over(runtime(128, true), readings(5), flushed.clone()).await?;
        assert_eq!(batch_sizes(&flushed).await, vec![5]);

        let legacy = InMemorySink::new();
        let summary = run_over(runtime(128, false), readings(5), legacy.clone()).await?;
        assert!(batch_sizes(&legacy).await.is_empty());
        assert_eq!(summary.records_dropped, 5);
        assert_eq!(legacy.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_exact_multiple_loses_nothing_either_way() -> Result<()> {
        for flush in [true, false] {
            let sink = InMemorySink::new();
            let summary = run_over(runtime(128, flush), readings(256), sink.clone()).await?;
            assert_eq!(batch_sizes(&sink).await, vec![128, 128]);
            assert!(summary.is_lossless());
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nothing_in_means_nothing_out() -> Result<()> {
        let sink = InMemorySink::new();
        let summary = run_over(runtime(128, true), Vec::new(), sink.clone()).await?;
        assert_eq!(sink.calls(), 0);
        assert_eq!(summary.records_read, 0);
        assert_eq!(summary.batches_submitted, 0);
        assert!(sink.is_closed().await);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_failed_batch_aborts_the_run() {
        let sink = InMemorySink::from_config(InMemorySinkConfig {
            fail_on_calls: vec![1],
        });
        let err = run_over(runtime(10, true), readings(50), sink.clone())
            .await
            .expect_err("💀 abort policy should end the run");

        let rendered = format!("{err:#}");
        assert!(rendered.contains("Batch 1"), "got: {rendered}");
        assert_eq!(batch_sizes(&sink).await, vec![10]);
        assert!(sink.is_closed().await);
    }

    #[tokio::test]
    async fn the_one_where_continue_shrugs_and_carries_on() -> Result<()> {
        let sink = InMemorySink::from_config(InMemorySinkConfig {
            fail_on_calls: vec![0],
        });
        let summary = run_over(
            RuntimeConfig {
                failure_policy: FailurePolicy::Continue,
                ..runtime(10, true)
            },
            readings(25),
            sink.clone(),
        )
        .await?;

        assert_eq!(batch_sizes(&sink).await, vec![10, 5]);
        assert_eq!(summary.batches_failed, 1);
        assert_eq!(summary.records_failed, 10);
        assert_eq!(summary.records_submitted, 15);
        assert_eq!(summary.batches_submitted, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_landed_records_are_not_counted_as_lost() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "FailedPutCount": 1,
                "RequestResponses": [
                    {"RecordId": "a"},
                    {"ErrorCode": "ServiceUnavailableException", "ErrorMessage": "Slow down."},
                    {"RecordId": "c"}
                ]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sink = FirehoseSink::new(FirehoseSinkConfig {
            destination_name: "IotStream".into(),
            region: Some("us-east-1".into()),
            endpoint_url: Some(server.uri()),
            access_key_id: Some("AKIDEXAMPLE".into()),
            secret_access_key: Some("wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".into()),
            session_token: None,
            request_timeout_secs: 5,
            retry: RetryConfig {
                max_retries: 2,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
            },
        })
        .await?;

        let summary = supervisor(RuntimeConfig {
            failure_policy: FailurePolicy::Continue,
            ..runtime(10, true)
        })
        .run_with(
            SourceBackend::InMemory(InMemorySource::new(readings(3))),
            SinkBackend::Firehose(sink),
        )
        .await?;

        assert_eq!(summary.records_read, 3);
        assert_eq!(summary.records_submitted, 2);
        assert_eq!(summary.records_failed, 1);
        assert_eq!(summary.batches_failed, 1);
        assert_eq!(summary.retries, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_gigantic_batch_size_just_means_one_batch() -> Result<()> {
        let sink = InMemorySink::new();
        let summary = run_over(runtime(usize::MAX / 2, true), readings(5), sink.clone()).await?;
        assert_eq!(batch_sizes(&sink).await, vec![5]);
        assert!(summary.is_lossless());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_one_slot_queue_still_gets_there() -> Result<()> {
        let sink = InMemorySink::new();
        let summary = run_over(
            RuntimeConfig {
                queue_capacity: 1,
                record_format: RecordFormat::Compact,
                ..runtime(3, true)
            },
            readings(100),
            sink.clone(),
        )
        .await?;
        assert_eq!(sink.calls(), 34);
        assert_eq!(summary.records_submitted, 100);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_csv_becomes_a_file_of_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let csv_path = dir.path().join("IOT-temp.csv");
        let out_path = dir.path().join("out.ndjson");
        let mut csv = String::from("id,room_id/id,noted_date,temp,out/in\n");
        for i in 0..7 {
            csv.push_str(&format!("r{i},Room Admin,08-12-2018 09:3{i},{},In\n", 25 + i));
        }
        std::fs::write(&csv_path, csv)?;

        let summary = Supervisor::new(AppConfig {
            source_config: SourceConfig::Csv(CsvSourceConfig {
                file_name: csv_path.to_string_lossy().into_owned(),
                delimiter: ',',
                infer_types: true,
            }),
            sink_config: SinkConfig::File(FileSinkConfig {
                file_name: out_path.to_string_lossy().into_owned(),
            }),
            runtime: RuntimeConfig {
                record_format: RecordFormat::Compact,
                ..runtime(3, true)
            },
        })
        .run()
        .await?;

        assert_eq!(summary.records_read, 7);
        assert_eq!(summary.batches_submitted, 3);

        let written = std::fs::read_to_string(&out_path)?;
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[0],
            r#"{"id":"r0","room_id/id":"Room Admin","noted_date":"08-12-2018 09:30","temp":25,"out/in":"In"}"#
        );
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_bad_config_never_starts() {
        let result = supervisor(runtime(0, true)).run().await;
        assert!(result.is_err());
    }
}
