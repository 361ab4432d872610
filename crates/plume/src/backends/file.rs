// ai
//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The Firehose bill came in. Someone asked whether the simulator could just write
//! what it *would* have sent to a local file instead. It could. This is that.
//!
//! The file sink writes each payload's documents back to back, newline-terminated,
//! exactly as the delivery stream would have concatenated them into an S3 object.
//! Handy for dry runs, for diffing, and for piping into `jq` at 3am.
//!
//! 🚰 Batch → Encoder → Payload → FileSink → BufWriter → disk
//! 💀 Disk full → your problem now
//! 🦆 (mandatory, no notes)

mod file_sink;

pub(crate) use file_sink::{FileSink, FileSinkConfig};
