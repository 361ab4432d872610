// ai
//! 🔄 Retry knobs and the exponential backoff schedule that obeys them.
//!
//! Firehose throttles. Firehose has bad days. Firehose occasionally accepts 127 of
//! your 128 records and shrugs about the last one. This module decides how long we
//! wait before asking again, and how many times we ask before giving up.
//!
//! `max_retries = 0` means "ask once, accept the answer", which is exactly what the
//! old simulator did, minus the part where it didn't look at the answer. 🦆

use std::time::Duration;

use serde::Deserialize;

/// 🔧 How persistent the sink should be.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// 🔁 Extra attempts after the first. 0 = no retries.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// ⏱️ First delay, in milliseconds. Doubles every retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// 🧱 The ceiling the doubling bumps into.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    100
}

fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryConfig {
    /// 🚫 One shot, no second chances.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// 🗓️ A fresh schedule. Call once per batch; each one gets its own budget.
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_delay: Duration::from_millis(self.initial_backoff_ms),
            max_delay: Duration::from_millis(self.max_backoff_ms.max(self.initial_backoff_ms)),
            remaining: self.max_retries,
        }
    }
}

/// ⏳ Yields the delay before each retry: initial, doubled, doubled again, capped.
/// Runs dry after `max_retries` items.
#[derive(Debug, Clone)]
pub struct Backoff {
    next_delay: Duration,
    max_delay: Duration,
    remaining: u32,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let delay = self.next_delay.min(self.max_delay);
        self.next_delay = self.next_delay.saturating_mul(2);
        Some(delay)
    }
}
