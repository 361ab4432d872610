use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::backends::Sink;
use crate::common::{Delivery, Payload};

/// 🧪 Knobs for the test sink.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct InMemorySinkConfig {
    /// 💥 0-based call numbers that fail instead of storing the payload.
    pub fail_on_calls: Vec<u64>,
}

/// 📦 A sink that never forgets.
///
/// Clone-able because tests need to peek inside after handing `self` off to the
/// pipeline. Every clone shares the same `received` Vec and the same call counter.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    /// 🔒 The evidence locker: every payload that was accepted, in arrival order.
    pub(crate) received: Arc<Mutex<Vec<Payload>>>,
    calls: Arc<AtomicU64>,
    closed: Arc<Mutex<bool>>,
    config: InMemorySinkConfig,
}

impl InMemorySink {
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::from_config(InMemorySinkConfig::default())
    }

    pub(crate) fn from_config(config: InMemorySinkConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// 📞 How many times `send` was called, successes and failures alike.
    #[cfg(test)]
    pub(crate) fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) async fn is_closed(&self) -> bool {
        *self.closed.lock().await
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, payload: &Payload) -> Result<Delivery> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.config.fail_on_calls.contains(&call) {
            bail!(
                "💥 In-memory sink was told to fail call {} (batch {}). It obliged.",
                call,
                payload.sequence
            );
        }
        self.received.lock().await.push(payload.clone());
        Ok(Delivery::clean(payload.len()))
    }

    async fn close(&mut self) -> Result<()> {
        *self.closed.lock().await = true;
        Ok(())
    }
}
