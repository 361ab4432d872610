use std::collections::VecDeque;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::backends::Source;
use crate::common::Record;

/// 📦 Fixture rows, usually straight out of TOML:
///
/// ```toml
/// [[source_config.InMemory.rows]]
/// temp = 29
/// room = "Admin"
/// ```
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InMemorySourceConfig {
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

/// 📦 Replays a fixed list of records, once, in order.
#[derive(Debug, Default)]
pub(crate) struct InMemorySource {
    // -- 🔒 front = next up. Drained, never refilled.
    remaining: VecDeque<Record>,
}

impl InMemorySource {
    pub(crate) fn new(records: Vec<Record>) -> Self {
        Self {
            remaining: records.into(),
        }
    }

    pub(crate) fn from_config(config: InMemorySourceConfig) -> Self {
        Self::new(config.rows.into_iter().map(Record::new).collect())
    }
}

#[async_trait]
impl Source for InMemorySource {
    /// 🎯 Next record off the front. `None` once the fixture is spent, forever after.
    async fn next_record(&mut self) -> Result<Option<Record>> {
        Ok(self.remaining.pop_front())
    }
}
