// ai
//! 📄 Tabular sources: rows and columns, the original distributed database.
//!
//! The greenhouse exported its sensor log as a CSV. Header row up top, one reading per
//! line underneath. This module reads it lazily, one row at a time, and hands each row
//! over as a [`Record`](crate::common::Record) keyed by column name.
//!
//! 🧠 Knowledge graph:
//! - A `csv::Reader` over the file runs on tokio's blocking pool and feeds `CsvSource`
//!   through a bounded channel. Finite, single pass, no rewinds.
//! - Duplicate column names get pandas-style suffixes (`temp`, `temp.1`) instead of
//!   silently overwriting each other.
//! - Cell types are inferred per cell (`infer_cell`), because we stream and never see the
//!   whole column. "29" → 29, "29.5" → 29.5, "" → null, "True" → true, everything else stays text.
//! - Progress is reported by bytes consumed against the file size.
//!
//! 🦆

mod csv_source;

pub(crate) use csv_source::{CsvSource, CsvSourceConfig};
