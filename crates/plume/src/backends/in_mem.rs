//! # Previously, on Plume...
//!
//! 🎬 The greenhouse sensors were offline. The Firehose was a LocalStack container
//! that hadn't been started. Someone still needed to prove the batcher worked.
//!
//! `in_mem` provides an in-memory [`Source`](crate::backends::Source) and
//! [`Sink`](crate::backends::Sink). The source replays rows handed to it (from a
//! test, or from a `[[source_config.InMemory.rows]]` TOML fixture). The sink keeps
//! every payload it receives behind an `Arc<Mutex<...>>` so tests can inspect what
//! arrived, and can be told to fail on chosen calls so failure handling gets a
//! workout too.
//!
//! 🦆
//!
//! ✅ No network calls. No disk I/O. Just vibes and heap memory.

mod in_mem_sink;
mod in_mem_source;

pub(crate) use in_mem_sink::{InMemorySink, InMemorySinkConfig};
pub(crate) use in_mem_source::{InMemorySource, InMemorySourceConfig};
