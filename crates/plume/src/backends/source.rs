use anyhow::Result;
use async_trait::async_trait;

use crate::backends::{in_mem, tabular};
use crate::common::Record;

/// 🚰 A source that produces one record per call.
///
/// # Contract 📜
/// - `next_record` returns `Ok(Some(record))` while rows remain, in input order.
/// - `Ok(None)` = EOF. The well is dry. Calling again keeps returning `None`.
/// - Finite and single-pass. Restarting means building a new source.
/// - No schema validation. Whatever types the reader inferred pass through untouched.
#[async_trait]
pub(crate) trait Source: std::fmt::Debug + Send {
    async fn next_record(&mut self) -> Result<Option<Record>>;
}

/// 🎭 The many faces of a Source.
///
/// Ancient proverb: "He who hardcodes the backend, simulates only one greenhouse."
#[derive(Debug)]
pub(crate) enum SourceBackend {
    InMemory(in_mem::InMemorySource),
    Csv(tabular::CsvSource),
}

#[async_trait]
impl Source for SourceBackend {
    async fn next_record(&mut self) -> Result<Option<Record>> {
        match self {
            SourceBackend::InMemory(i) => i.next_record().await,
            SourceBackend::Csv(c) => c.next_record().await,
        }
    }
}
