use std::collections::{HashMap, HashSet};
use std::fs::File;

use anyhow::{Context, Result, bail};
use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use tracing::{debug, trace, warn};

use crate::backends::Source;
use crate::common::Record;
use crate::progress::ProgressMetrics;

// -- 📊 redrawing a comfy table per row would cost more than reading the row
const PROGRESS_EVERY_RECORDS: u64 = 256;

// -- 📦 rows parsed ahead of the batcher
const READ_AHEAD_RECORDS: usize = 1024;

// -- 📂 CsvSourceConfig: co-located with the source that reads it.
#[derive(Debug, Deserialize, Clone)]
pub struct CsvSourceConfig {
    pub file_name: String,
    /// 🔪 Field separator. Must be a single ASCII character.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    /// 🔮 Guess numbers, booleans and nulls. `false` keeps every cell as a string.
    #[serde(default = "default_infer_types")]
    pub infer_types: bool,
}

fn default_delimiter() -> char {
    ','
}

fn default_infer_types() -> bool {
    true
}

/// 🔮 Give a raw CSV cell a JSON type.
///
/// Empty → `null`, integer → i64, finite float → f64, the usual spellings of
/// true/false → bool, anything else → the original text, untrimmed.
fn infer_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = trimmed.parse::<f64>() {
        // -- 🐛 "inf" and "NaN" parse as floats but JSON has no spelling for them
        if let Some(number) = Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    match trimmed {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(raw.to_owned()),
    }
}

/// 🏷️ Make header names unique the way pandas does: the second `temp` becomes `temp.1`,
/// the third `temp.2`, skipping any name the file already uses.
fn dedupe_headers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let raw: Vec<&str> = raw.into_iter().collect();
    let mut taken: HashSet<String> = raw.iter().map(|name| (*name).to_owned()).collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(raw.len());
    let mut suffixes: HashMap<&str, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(raw.len());

    for name in raw {
        if seen.insert(name) {
            headers.push(name.to_owned());
            continue;
        }
        let counter = suffixes.entry(name).or_insert(0);
        let renamed = loop {
            *counter += 1;
            let candidate = format!("{name}.{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        warn!("⚠️ Duplicate CSV column '{}' renamed to '{}'", name, renamed);
        taken.insert(renamed.clone());
        headers.push(renamed);
    }
    headers
}

/// 📖 The blocking half: owns the `csv::Reader` and the progress bar, and lives on
/// tokio's blocking pool so file reads never stall a runtime worker.
struct CsvReader {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    row: csv::StringRecord,
    file_name: String,
    infer_types: bool,
    progress: ProgressMetrics,
    // -- 📊 what the progress bar has already been told about
    reported_bytes: u64,
    reported_records: u64,
    records_read: u64,
}

impl CsvReader {
    /// 🚪 Open the file and read the header row. Blocking.
    fn open(source_config: &CsvSourceConfig, show_progress: bool) -> Result<Self> {
        if !source_config.delimiter.is_ascii() {
            bail!(
                "💀 CSV delimiter {:?} is not a single ASCII character. The csv crate only speaks bytes.",
                source_config.delimiter
            );
        }

        let file_handle = File::open(&source_config.file_name).with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. We checked if it existed (it might not). \
                 We checked permissions (they might be wrong). The file remains unopened.",
                source_config.file_name
            )
        })?;
        // 📏 0 = unknown size; the bar just won't know where the end is
        let file_size = file_handle.metadata().map(|m| m.len()).unwrap_or(0);

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(source_config.delimiter as u8)
            .has_headers(true)
            .flexible(false)
            .from_reader(file_handle);

        let raw_headers = reader.headers().with_context(|| {
            format!(
                "💀 Couldn't read the header row of '{}'",
                source_config.file_name
            )
        })?;
        if raw_headers.is_empty() || raw_headers.iter().all(str::is_empty) {
            bail!(
                "💀 '{}' has no header row. Records need column names to be records.",
                source_config.file_name
            );
        }
        let headers = dedupe_headers(raw_headers.iter());
        debug!(
            "📄 '{}' opened with columns {:?}",
            source_config.file_name, headers
        );

        let progress = if show_progress {
            ProgressMetrics::new(source_config.file_name.clone(), file_size)
        } else {
            ProgressMetrics::hidden(source_config.file_name.clone(), file_size)
        };

        Ok(Self {
            reader,
            headers,
            row: csv::StringRecord::new(),
            file_name: source_config.file_name.clone(),
            infer_types: source_config.infer_types,
            progress,
            reported_bytes: 0,
            reported_records: 0,
            records_read: 0,
        })
    }

    /// 📄 Next row as a record, `None` at EOF. Blocking.
    fn read_next(&mut self) -> Result<Option<Record>> {
        let has_row = self.reader.read_record(&mut self.row).with_context(|| {
            format!(
                "💀 Row {} of '{}' didn't parse. Ragged rows (more or fewer fields than the header) \
                 are the usual suspect.",
                self.records_read + 1,
                self.file_name
            )
        })?;

        if !has_row {
            self.report_progress();
            self.progress.finish();
            debug!(
                "🏁 '{}' exhausted after {} records ({} bytes)",
                self.file_name,
                self.progress.total_records(),
                self.progress.total_bytes()
            );
            return Ok(None);
        }

        self.records_read += 1;
        if self.records_read % PROGRESS_EVERY_RECORDS == 0 {
            self.report_progress();
        }
        trace!("📖 row {} read", self.records_read);
        Ok(Some(self.row_to_record()))
    }

    /// 🚰 Read until EOF, the first error, or until nobody is listening anymore.
    fn pump(mut self, tx: Sender<Result<Record>>) {
        loop {
            let (item, last) = match self.read_next() {
                Ok(Some(record)) => (Ok(record), false),
                Ok(None) => return,
                Err(err) => (Err(err), true),
            };
            if tx.send_blocking(item).is_err() || last {
                return;
            }
        }
    }

    fn report_progress(&mut self) {
        let position = self.reader.position().byte();
        self.progress.update(
            position.saturating_sub(self.reported_bytes),
            self.records_read - self.reported_records,
        );
        self.reported_bytes = position;
        self.reported_records = self.records_read;
    }

    fn row_to_record(&self) -> Record {
        let fields: Map<String, Value> = self
            .headers
            .iter()
            .zip(self.row.iter())
            .map(|(column, cell)| {
                let value = if self.infer_types {
                    infer_cell(cell)
                } else {
                    Value::String(cell.to_owned())
                };
                (column.clone(), value)
            })
            .collect();
        Record::new(fields)
    }
}

/// 📂 CsvSource: one CSV row in, one `Record` out, until the file runs dry.
///
/// The reading itself happens in a [`CsvReader`] on `spawn_blocking`, a bounded
/// read-ahead channel away. Dropping the source hangs up the channel and the reader
/// thread stops at its next row.
#[derive(Debug)]
pub(crate) struct CsvSource {
    rx: Receiver<Result<Record>>,
    source_config: CsvSourceConfig,
    records_read: u64,
    exhausted: bool,
}

impl CsvSource {
    /// 🚀 Opens the file, reads the header row, and starts the reader thread.
    pub(crate) async fn new(source_config: CsvSourceConfig, show_progress: bool) -> Result<Self> {
        let opening = source_config.clone();
        let reader = tokio::task::spawn_blocking(move || CsvReader::open(&opening, show_progress))
            .await
            .context("💀 The CSV opener thread panicked")??;

        let (tx, rx) = async_channel::bounded(READ_AHEAD_RECORDS);
        tokio::task::spawn_blocking(move || reader.pump(tx));

        Ok(Self {
            rx,
            source_config,
            records_read: 0,
            exhausted: false,
        })
    }
}

#[async_trait]
impl Source for CsvSource {
    /// 📄 Next row. `None` at EOF, and every call after. After an error, also `None`.
    async fn next_record(&mut self) -> Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.rx.recv().await {
            Ok(Ok(record)) => {
                self.records_read += 1;
                Ok(Some(record))
            }
            Ok(Err(err)) => {
                self.exhausted = true;
                Err(err)
            }
            // -- 🏁 the reader thread hung up: EOF
            Err(_) => {
                self.exhausted = true;
                debug!(
                    "🏁 CsvSource for '{}' done after {} records",
                    self.source_config.file_name, self.records_read
                );
                Ok(None)
            }
        }
    }
}
