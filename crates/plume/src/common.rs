// ai
//! 📦 Common data structures: the building blocks of plume.
//!
//! 🎬 COLD OPEN: INT. GREENHOUSE - 3:47 AM
//!
//! A temperature sensor reports 29 degrees. Then 29 again. Then 28, just to
//! keep everyone on their toes. Every reading becomes a CSV row, every row
//! becomes a [`Record`], and every [`Record`] rides a [`Batch`] to the Firehose.
//! None of them know what S3 is. None of them need to. 🦆
//!
//! The structs here ferry rows from the source to the sink and report back how
//! the trip went. They don't ask questions. They carry the data.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

/// 🎯 One row of tabular input, as a column-name to value mapping.
///
/// Backed by an insertion-ordered `serde_json::Map` (the workspace enables
/// `preserve_order`), so the JSON we emit lists columns in the same order the
/// CSV header did. Ephemeral: born from a row, dies after serialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Record {
    pub fields: Map<String, Value>,
}

impl Record {
    /// 🏗️ Wrap an existing map. No validation; the row is what it is.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// 🔧 Build a record from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<K, I>(pairs: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            fields: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// 🔍 Peek at a column by name.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// 📦 A bounded, ordered group of records submitted together.
///
/// `sequence` counts emitted batches from 0 in the order the batcher let them
/// go. It shows up in logs and error messages so "batch 41 failed" means
/// something at 3am.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Batch {
    pub sequence: u64,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(sequence: u64, records: Vec<Record>) -> Self {
        Self { sequence, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// 📨 What a batch looks like once the encoder is done with it: one
/// newline-terminated JSON document per record, in record order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Payload {
    pub sequence: u64,
    pub documents: Vec<String>,
}

impl Payload {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// 📊 Total bytes across every document. The number Firehose cares about.
    pub fn total_bytes(&self) -> usize {
        self.documents.iter().map(String::len).sum()
    }
}

/// 🧾 The receipt a sink hands back after a `send`.
///
/// `failed` counts records the endpoint still refused after every retry the
/// sink was willing to make. `attempts` is 1 for a clean first try.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delivery {
    pub accepted: usize,
    pub failed: usize,
    pub attempts: u32,
}

impl Delivery {
    /// ✅ Everything landed on the first try.
    pub fn clean(accepted: usize) -> Self {
        Self {
            accepted,
            failed: 0,
            attempts: 1,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// 🧾 Attached as context to a failed `send` when part of the batch already landed.
///
/// The sink worker digs it out with `downcast_ref` so records the endpoint did
/// accept are counted as submitted, not failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialDelivery {
    pub sequence: u64,
    pub delivery: Delivery,
}

impl std::fmt::Display for PartialDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "💀 Batch {} gave up after {} attempts with {} records accepted and {} not",
            self.sequence, self.delivery.attempts, self.delivery.accepted, self.delivery.failed
        )
    }
}

/// 📊 The end-of-run scoreboard.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSummary {
    pub records_read: u64,
    pub records_submitted: u64,
    pub records_failed: u64,
    /// ⚠️ Only non-zero when `flush_trailing_batch = false`. The legacy gap, counted.
    pub records_dropped: u64,
    pub batches_submitted: u64,
    pub batches_failed: u64,
    pub retries: u64,
    pub elapsed: Duration,
}

impl RunSummary {
    /// ✅ Every record that was read made it to the endpoint.
    pub fn is_lossless(&self) -> bool {
        self.records_failed == 0 && self.records_dropped == 0
    }
}
