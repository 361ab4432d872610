// ai
//! 🎬 *[the batch is full. the encoder awaits. the Firehose hungers.]*
//!
//! 🎼 The Encoder module: turns a [`Batch`] of records into a [`Payload`] of
//! newline-terminated JSON documents, one per record, in order.
//!
//! 🧠 Knowledge graph:
//! - **Pretty** (`PrettyEncoder`): 2-space indented JSON + `\n`. The default, and the
//!   exact shape the old sensor simulator shipped to S3.
//! - **Compact** (`CompactEncoder`): single-line JSON + `\n`. NDJSON, the format of
//!   people who like their Athena queries fast.
//! - Resolution: from `RuntimeConfig::record_format`, same trait → impls → enum dispatcher
//!   pattern as the backends.
//! - The batcher also calls the encoder, for sizing. Same bytes it measures are the bytes
//!   that get sent. No "estimated" sizes, no surprises at the 4 MiB line.
//!
//! 🦆 (the duck prefers compact. the duck has been outvoted.)

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::common::{Batch, Payload, Record};

/// 🎨 How each record is rendered on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    /// 📜 Indented JSON, like `json.dumps(record, indent=2)` would have it.
    #[default]
    Pretty,
    /// 📡 One line per record. NDJSON.
    Compact,
}

/// 🎼 Renders records into newline-terminated JSON documents.
pub trait Encoder: std::fmt::Debug {
    /// 🔄 One record in, one document out. Always ends in exactly one `\n`.
    fn encode_record(&self, record: &Record) -> Result<String>;

    /// 📦 Encode every record in the batch, preserving order.
    fn encode_batch(&self, batch: &Batch) -> Result<Payload> {
        let documents = batch
            .records
            .iter()
            .map(|record| self.encode_record(record))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("💀 Batch {} refused to become JSON", batch.sequence))?;
        Ok(Payload {
            sequence: batch.sequence,
            documents,
        })
    }
}

/// 📜 2-space indented JSON, trailing newline.
#[derive(Debug, Clone, Copy)]
pub struct PrettyEncoder;

impl Encoder for PrettyEncoder {
    #[inline]
    fn encode_record(&self, record: &Record) -> Result<String> {
        let mut document = serde_json::to_string_pretty(record)
            .context("💀 serde_json could not pretty-print a record")?;
        document.push('\n');
        Ok(document)
    }
}

/// 📡 Single-line JSON, trailing newline.
#[derive(Debug, Clone, Copy)]
pub struct CompactEncoder;

impl Encoder for CompactEncoder {
    #[inline]
    fn encode_record(&self, record: &Record) -> Result<String> {
        let mut document =
            serde_json::to_string(record).context("💀 serde_json could not serialize a record")?;
        document.push('\n');
        Ok(document)
    }
}

/// 🎭 The polymorphic encoder. Wraps the concrete encoders, dispatches via match.
#[derive(Debug, Clone, Copy)]
pub enum EncoderBackend {
    Pretty(PrettyEncoder),
    Compact(CompactEncoder),
}

impl EncoderBackend {
    /// 🔧 Resolve the encoder from the configured record format.
    pub fn from_format(format: RecordFormat) -> Self {
        match format {
            RecordFormat::Pretty => Self::Pretty(PrettyEncoder),
            RecordFormat::Compact => Self::Compact(CompactEncoder),
        }
    }
}

impl Encoder for EncoderBackend {
    #[inline]
    fn encode_record(&self, record: &Record) -> Result<String> {
        match self {
            Self::Pretty(e) => e.encode_record(record),
            Self::Compact(e) => e.encode_record(record),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn sensor_reading() -> Record {
        Record::from_pairs([
            ("id", json!("__export__.temp_log_196134_bd201015")),
            ("room_id/id", json!("Room Admin")),
            ("noted_date", json!("08-12-2018 09:30")),
            ("temp", json!(29)),
            ("out/in", json!("In")),
        ])
    }

    #[test]
    fn compact_the_one_where_a_record_is_one_line() -> Result<()> {
        let doc = CompactEncoder.encode_record(&Record::from_pairs([("a", json!(1))]))?;
        assert_eq!(doc, "{\"a\":1}\n");
        Ok(())
    }

    #[test]
    fn pretty_the_one_where_indentation_is_two_spaces() -> Result<()> {
        let doc = PrettyEncoder.encode_record(&Record::from_pairs([
            ("temp", json!(29)),
            ("out/in", json!("In")),
        ]))?;
        assert_eq!(doc, "{\n  \"temp\": 29,\n  \"out/in\": \"In\"\n}\n");
        Ok(())
    }

    #[test]
    fn the_one_where_documents_round_trip_to_the_same_row() -> Result<()> {
        let record = sensor_reading();
        for format in [RecordFormat::Pretty, RecordFormat::Compact] {
            let doc = EncoderBackend::from_format(format).encode_record(&record)?;
            assert!(doc.ends_with('\n') && !doc.ends_with("\n\n"));
            let parsed: Value = serde_json::from_str(&doc)?;
            assert_eq!(parsed, Value::Object(record.fields.clone()));
        }
        Ok(())
    }

    #[test]
    fn the_one_where_batch_order_survives_encoding() -> Result<()> {
        let batch = Batch::new(
            7,
            (0..5).map(|i| Record::from_pairs([("n", json!(i))])).collect(),
        );
        let payload = CompactEncoder.encode_batch(&batch)?;
        assert_eq!(payload.sequence, 7);
        assert_eq!(
            payload.documents,
            vec!["{\"n\":0}\n", "{\"n\":1}\n", "{\"n\":2}\n", "{\"n\":3}\n", "{\"n\":4}\n"]
        );
        Ok(())
    }

    #[test]
    fn the_one_where_format_names_parse_from_config() {
        #[derive(Deserialize)]
        struct Holder {
            format: RecordFormat,
        }
        let h: Holder = serde_json::from_str(r#"{"format":"compact"}"#).unwrap();
        assert_eq!(h.format, RecordFormat::Compact);
        assert_eq!(RecordFormat::default(), RecordFormat::Pretty);
    }
}
