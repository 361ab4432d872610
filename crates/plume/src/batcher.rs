// ai
//! 🪣 The Batcher: an explicit, owned accumulator that turns a stream of
//! records into bounded batches.
//!
//! 🧠 Knowledge graph:
//! - Bounded two ways: record count (`max_records`, the Firehose caps this at 500) and
//!   encoded bytes (`max_bytes`, Firehose caps a call at 4 MiB).
//! - Sizes are measured with the same [`Encoder`] the sink worker uses, so a batch that
//!   fits here fits on the wire.
//! - `finish()` hands back the trailing partial batch. Whether anyone sends it is the
//!   source worker's call (`flush_trailing_batch`), not ours.
//! - No globals. The accumulator lives in `self`, owned by whoever drives the loop.
//!
//! "He who keeps his batch in a module-level list, debugs it in production." 📜

use anyhow::{Result, bail};
use tracing::warn;

use crate::common::{Batch, Record};
use crate::encoder::{Encoder, EncoderBackend};

/// 📏 The two ceilings a batch must stay under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_records: usize,
    pub max_bytes: usize,
}

// -- 📏 reserve up to this many slots per batch; bigger batches grow on demand
const MAX_RESERVED_RECORDS: usize = 512;

fn initial_capacity(limits: BatchLimits) -> usize {
    limits.max_records.min(MAX_RESERVED_RECORDS)
}

/// 🪣 Accumulates records in arrival order and emits full batches.
#[derive(Debug)]
pub struct Batcher {
    limits: BatchLimits,
    encoder: EncoderBackend,
    buffer: Vec<Record>,
    buffered_bytes: usize,
    next_sequence: u64,
}

impl Batcher {
    /// 🏗️ A fresh, empty accumulator. Zero-sized limits are a config bug, so we bail.
    pub fn new(limits: BatchLimits, encoder: EncoderBackend) -> Result<Self> {
        if limits.max_records == 0 {
            bail!("💀 A batch size of 0 would batch nothing, forever. Pick at least 1.");
        }
        if limits.max_bytes == 0 {
            bail!("💀 A byte budget of 0 fits no record at all. Pick at least 1.");
        }
        Ok(Self {
            limits,
            encoder,
            buffer: Vec::with_capacity(initial_capacity(limits)),
            buffered_bytes: 0,
            next_sequence: 0,
        })
    }

    /// 📥 Append a record. Returns a batch when one is ready to go.
    ///
    /// If the record would push a non-empty buffer past the byte budget, the buffer
    /// is emitted first and the record starts the next batch. If the record fills the
    /// buffer to `max_records`, the buffer is emitted with it. Both cannot happen on
    /// the same push: after a byte-triggered emit the buffer holds one record, and a
    /// one-record batch never took the byte branch.
    pub fn push(&mut self, record: Record) -> Result<Option<Batch>> {
        let record_bytes = self.encoder.encode_record(&record)?.len();
        if record_bytes > self.limits.max_bytes {
            warn!(
                "⚠️ A single record encodes to {} bytes, over the {} byte batch budget. \
                 It will travel alone and the endpoint may still refuse it.",
                record_bytes, self.limits.max_bytes
            );
        }

        let mut ready = None;
        if !self.buffer.is_empty() && self.buffered_bytes + record_bytes > self.limits.max_bytes {
            ready = Some(self.take());
        }

        self.buffer.push(record);
        self.buffered_bytes += record_bytes;

        if self.buffer.len() >= self.limits.max_records {
            debug_assert!(ready.is_none());
            ready = Some(self.take());
        }
        Ok(ready)
    }

    /// 🏁 End of input. Hand back whatever is left, if anything.
    pub fn finish(&mut self) -> Option<Batch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    /// 📊 Records currently waiting for a batch.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// 🔢 How many batches have left the building.
    pub fn emitted(&self) -> u64 {
        self.next_sequence
    }

    fn take(&mut self) -> Batch {
        let records = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(initial_capacity(self.limits)),
        );
        self.buffered_bytes = 0;
        let batch = Batch::new(self.next_sequence, records);
        self.next_sequence += 1;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{CompactEncoder, RecordFormat};
    use serde_json::json;

    fn record(n: usize) -> Record {
        Record::from_pairs([("n", json!(n))])
    }

    fn batcher(max_records: usize, max_bytes: usize) -> Batcher {
        Batcher::new(
            BatchLimits {
                max_records,
                max_bytes,
            },
            EncoderBackend::Compact(CompactEncoder),
        )
        .unwrap()
    }

    fn drain(batcher: &mut Batcher, count: usize) -> Vec<Batch> {
        let mut out = Vec::new();
        for n in 0..count {
            if let Some(batch) = batcher.push(record(n)).unwrap() {
                out.push(batch);
            }
        }
        out
    }

    #[test]
    fn the_one_where_k_times_n_records_make_exactly_k_batches() {
        let mut b = batcher(128, usize::MAX);
        let batches = drain(&mut b, 3 * 128);
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|batch| batch.len() == 128));
        assert_eq!(b.pending(), 0);
        assert!(b.finish().is_none(), "nothing left over, nothing to flush");
    }

    #[test]
    fn the_one_where_the_stragglers_wait_for_finish() {
        let mut b = batcher(4, usize::MAX);
        let batches = drain(&mut b, 2 * 4 + 3);
        assert_eq!(batches.len(), 2);
        assert_eq!(b.pending(), 3);
        let tail = b.finish().expect("💀 trailing records vanished");
        assert_eq!(tail.len(), 3);
        assert_eq!(tail.sequence, 2);
        assert_eq!(b.pending(), 0);
    }

    #[test]
    fn the_one_where_an_enormous_batch_size_reserves_nothing_silly() {
        let mut b = batcher(usize::MAX / 2, usize::MAX);
        assert!(drain(&mut b, 5).is_empty());
        assert!(b.buffer.capacity() <= MAX_RESERVED_RECORDS);
        let tail = b.finish().expect("💀 five records went missing");
        assert_eq!(tail.len(), 5);
    }

    #[test]
    fn the_one_where_order_is_never_shuffled() {
        let mut b = batcher(3, usize::MAX);
        let mut batches = drain(&mut b, 10);
        batches.extend(b.finish());
        let seen: Vec<Record> = batches.into_iter().flat_map(|b| b.records).collect();
        let expected: Vec<Record> = (0..10).map(record).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn the_one_where_sequences_count_up_from_zero() {
        let mut b = batcher(2, usize::MAX);
        let mut batches = drain(&mut b, 5);
        batches.extend(b.finish());
        let sequences: Vec<u64> = batches.iter().map(|b| b.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(b.emitted(), 3);
    }

    #[test]
    fn the_one_where_the_byte_budget_cuts_early() {
        // 🧪 {"n":0}\n is 8 bytes; a 20 byte budget fits two of them, not three
        let mut b = batcher(100, 20);
        let batches = drain(&mut b, 5);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|batch| batch.len() == 2));
        assert_eq!(b.finish().map(|b| b.len()), Some(1));
    }

    #[test]
    fn the_one_where_a_chonky_record_travels_alone() {
        let mut b = batcher(10, 10);
        assert!(b.push(record(1)).unwrap().is_none());
        let big = Record::from_pairs([("blob", json!("x".repeat(64)))]);
        let first = b.push(big.clone()).unwrap().expect("small batch should be flushed first");
        assert_eq!(first.records, vec![record(1)]);
        let second = b.push(record(2)).unwrap().expect("the big one leaves by itself");
        assert_eq!(second.records, vec![big]);
    }

    #[test]
    fn the_one_where_batch_size_one_still_works() {
        let mut b = batcher(1, 1);
        let batches = drain(&mut b, 3);
        assert_eq!(batches.len(), 3);
        assert!(b.finish().is_none());
    }

    #[test]
    fn the_one_where_zero_limits_are_rejected() {
        let encoder = EncoderBackend::from_format(RecordFormat::Compact);
        let zero_records = Batcher::new(
            BatchLimits {
                max_records: 0,
                max_bytes: 10,
            },
            encoder,
        );
        assert!(zero_records.is_err());
        let zero_bytes = Batcher::new(
            BatchLimits {
                max_records: 10,
                max_bytes: 0,
            },
            encoder,
        );
        assert!(zero_bytes.is_err());
    }
}
