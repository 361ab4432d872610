use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_firehose::Client;
use aws_sdk_firehose::config::http::HttpResponse;
use aws_sdk_firehose::config::retry::RetryConfig as SdkRetryConfig;
use aws_sdk_firehose::config::{Credentials, Region};
use aws_sdk_firehose::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_firehose::operation::put_record_batch::PutRecordBatchError;
use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::Record as FirehoseRecord;
use serde::Deserialize;
use tracing::{debug, trace, warn};

use super::FIREHOSE_MAX_BATCH_RECORDS;
use crate::backends::Sink;
use crate::common::{Delivery, PartialDelivery, Payload};
use crate::retry::RetryConfig;

// -- 🏷️ request-level error codes that mean "try again later", not "you did it wrong"
const RETRYABLE_ERROR_CODES: &[&str] = &[
    "ServiceUnavailableException",
    "ThrottlingException",
    "LimitExceededException",
    "InternalFailure",
];

// -- 🧪 emulators don't care which region we sign for
const EMULATOR_REGION: &str = "us-east-1";

// -- 🔥 FirehoseSinkConfig: co-located with the sink. Ethos pattern, baby. 🎯
#[derive(Debug, Deserialize, Clone)]
pub struct FirehoseSinkConfig {
    /// 📡 The delivery stream to put records into. The old simulator hardcoded "IotStream".
    pub destination_name: String,
    /// 🌍 Falls back to the AWS region chain (`AWS_REGION`, `~/.aws/config`, IMDS).
    #[serde(default)]
    pub region: Option<String>,
    /// 🧪 Override the endpoint (LocalStack, a proxy, a wiremock in a test).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// 🔒 Static credentials. Without them the AWS default provider chain decides:
    /// env vars, `~/.aws` profiles, SSO, container and instance roles.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    /// ⏱️ Per-call timeout. Firehose is usually quick; usually.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// 💥 How a single PutRecordBatch call went wrong.
#[derive(Debug)]
enum PutError {
    /// 🔁 Throttled, 5xx, or the network blinked. Worth another go.
    Retryable(anyhow::Error),
    /// 🛑 Wrong stream, bad auth, malformed request. Retrying won't fix it.
    Fatal(anyhow::Error),
}

/// 🧾 Why the last attempt didn't finish the job.
enum Setback {
    Records(usize),
    Request(anyhow::Error),
}

/// 🔥 The Firehose sink: one `PutRecordBatch` per payload, with per-record retries.
///
/// The SDK's own retries are switched off. A refused record inside a 200 response is
/// invisible to them anyway, and a single retry loop keeps the attempt count honest.
#[derive(Debug)]
pub(crate) struct FirehoseSink {
    client: Client,
    sink_config: FirehoseSinkConfig,
}

impl FirehoseSink {
    /// 🚀 Build the Firehose client from the AWS environment, with config overrides on top.
    ///
    /// `aws-config` walks the usual chain for region and credentials. Static keys in the
    /// config win over the chain; half a key pair is an error.
    pub(crate) async fn new(config: FirehoseSinkConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(SdkRetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(10))
                    .operation_timeout(Duration::from_secs(config.request_timeout_secs))
                    .build(),
            );
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key_id,
                    secret_access_key,
                    config.session_token.clone(),
                    None,
                    "plume-config",
                ));
            }
            (None, None) => {}
            _ => bail!(
                "💀 Half a credential pair in sink_config.Firehose. Set both access_key_id and \
                 secret_access_key, or neither and let the AWS provider chain find them."
            ),
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_firehose::config::Builder::from(&sdk_config);
        let region = match (sdk_config.region(), &config.endpoint_url) {
            (Some(region), _) => region.to_string(),
            (None, Some(_)) => {
                builder = builder.region(Region::new(EMULATOR_REGION));
                EMULATOR_REGION.to_string()
            }
            (None, None) => bail!(
                "💀 No AWS region for Firehose stream '{}'. Set sink_config.Firehose.region, \
                 AWS_REGION, or a region in ~/.aws/config. The stream lives somewhere; we need \
                 to know where.",
                config.destination_name
            ),
        };
        let client = Client::from_conf(builder.build());

        debug!(
            "🔥 Firehose sink ready: stream '{}' in {} via {}",
            config.destination_name,
            region,
            config.endpoint_url.as_deref().unwrap_or("the regional endpoint")
        );
        Ok(Self {
            client,
            sink_config: config,
        })
    }

    /// 📡 One PutRecordBatch call for the documents at `pending` indexes.
    /// Returns the indexes (into `payload.documents`) that the endpoint refused.
    async fn put_record_batch(
        &self,
        payload: &Payload,
        pending: &[usize],
    ) -> std::result::Result<Vec<usize>, PutError> {
        let records = pending
            .iter()
            .map(|&index| {
                FirehoseRecord::builder()
                    .data(Blob::new(payload.documents[index].as_bytes()))
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("💀 Couldn't build the PutRecordBatch records")
            .map_err(PutError::Fatal)?;

        let output = self
            .client
            .put_record_batch()
            .delivery_stream_name(&self.sink_config.destination_name)
            .set_records(Some(records))
            .send()
            .await
            .map_err(|err| classify_failure(err, &self.sink_config.destination_name))?;

        let verdicts = output.request_responses();
        if verdicts.len() != pending.len() {
            return Err(PutError::Fatal(anyhow!(
                "💀 Sent {} records, got {} verdicts back. Somebody can't count.",
                pending.len(),
                verdicts.len()
            )));
        }

        trace!(
            "🧾 batch {}: FailedPutCount={} Encrypted={:?}",
            payload.sequence,
            output.failed_put_count(),
            output.encrypted()
        );

        let refused: Vec<usize> = pending
            .iter()
            .zip(verdicts)
            .filter_map(|(&index, verdict)| match verdict.error_code() {
                Some(code) => {
                    debug!(
                        "🚫 batch {} record {} refused: {} ({})",
                        payload.sequence,
                        index,
                        code,
                        verdict.error_message().unwrap_or("no message")
                    );
                    Some(index)
                }
                None => {
                    trace!("✅ record {} → {:?}", index, verdict.record_id());
                    None
                }
            })
            .collect();
        Ok(refused)
    }
}

/// 🔍 Sort an SDK failure into "try again" or "give up".
fn classify_failure(err: SdkError<PutRecordBatchError, HttpResponse>, stream: &str) -> PutError {
    let retryable = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status >= 500
                || status == 429
                || service.err().is_service_unavailable_exception()
                || service
                    .err()
                    .code()
                    .is_some_and(|code| RETRYABLE_ERROR_CODES.contains(&code))
        }
        _ => false,
    };
    let code = err.code().unwrap_or("UnknownError").to_string();
    let detail = err
        .message()
        .map(str::to_owned)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
    let wrapped = anyhow::Error::new(err).context(format!(
        "💀 Firehose said {} for stream '{}': {}",
        code, stream, detail
    ));
    if retryable {
        PutError::Retryable(wrapped)
    } else {
        PutError::Fatal(wrapped)
    }
}

#[async_trait]
impl Sink for FirehoseSink {
    /// 📡 Put the whole payload. Refused records are resubmitted (only them) on the
    /// retry schedule; request-level failures resend whatever is still pending.
    ///
    /// When the budget runs out, leftover refused records come back in `Delivery::failed`.
    /// A request-level failure comes back as `Err` carrying a [`PartialDelivery`], so
    /// records that already landed still count as accepted.
    async fn send(&mut self, payload: &Payload) -> Result<Delivery> {
        if payload.is_empty() {
            return Ok(Delivery::default());
        }
        if payload.len() > FIREHOSE_MAX_BATCH_RECORDS {
            bail!(
                "💀 Batch {} has {} records; PutRecordBatch takes at most {}",
                payload.sequence,
                payload.len(),
                FIREHOSE_MAX_BATCH_RECORDS
            );
        }

        let total = payload.len();
        let mut pending: Vec<usize> = (0..total).collect();
        let mut backoff = self.sink_config.retry.backoff();
        let mut attempts = 0u32;

        debug!(
            "📡 PutRecordBatch: batch {} ({} records, {} bytes) → '{}'",
            payload.sequence,
            total,
            payload.total_bytes(),
            self.sink_config.destination_name
        );

        let partial = |pending: &[usize], attempts: u32| PartialDelivery {
            sequence: payload.sequence,
            delivery: Delivery {
                accepted: total - pending.len(),
                failed: pending.len(),
                attempts,
            },
        };

        loop {
            attempts += 1;
            let setback = match self.put_record_batch(payload, &pending).await {
                Ok(refused) if refused.is_empty() => {
                    return Ok(Delivery {
                        accepted: total,
                        failed: 0,
                        attempts,
                    });
                }
                Ok(refused) => {
                    let count = refused.len();
                    pending = refused;
                    Setback::Records(count)
                }
                Err(PutError::Retryable(err)) => Setback::Request(err),
                Err(PutError::Fatal(err)) => {
                    return Err(err
                        .context(partial(&pending, attempts))
                        .context("💀 Retrying won't help this one"));
                }
            };

            let Some(delay) = backoff.next() else {
                return match setback {
                    Setback::Records(count) => Ok(Delivery {
                        accepted: total - count,
                        failed: count,
                        attempts,
                    }),
                    Setback::Request(err) => Err(err
                        .context(partial(&pending, attempts))
                        .context(format!(
                            "💀 Batch {} still failing after {} attempts. We gave it our best.",
                            payload.sequence, attempts
                        ))),
                };
            };

            match &setback {
                Setback::Records(count) => warn!(
                    "🔁 batch {}: {} of {} records refused, retrying them in {:?}",
                    payload.sequence, count, total, delay
                ),
                Setback::Request(err) => warn!(
                    "🔁 batch {}: {:#}; retrying in {:?}",
                    payload.sequence, err, delay
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// 🗑️ Nothing buffered, nothing to flush. The connection pool says goodbye on drop.
    async fn close(&mut self) -> Result<()> {
        debug!(
            "🗑️ Firehose sink for '{}' closing",
            self.sink_config.destination_name
        );
        Ok(())
    }
}
