// AI
//! 📊 progress.rs: "Are we there yet?" (every simulator, every time, forever)
//!
//! 🚀 Answers the age-old question: "how many sensor readings have we shoveled so far?"
//! With a progress bar sized by the input file, and a small comfy table underneath it.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.

use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

// -- 📏 one mebibyte. not a megabyte, pedants.
const MIB: u64 = 1024 * 1024;

/// 📦 Bytes, scaled to whatever unit keeps the number readable.
pub(crate) fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= 1024 {
        format!("{:.2} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{} bytes", bytes)
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📊 Tracks bytes and records read from a source and paints them onto an indicatif bar.
///
/// The bar's length is the input file's size, so the position is "bytes consumed".
/// tqdm counted rows; we count bytes because a streaming CSV reader doesn't know the row
/// count until it's too late to be useful.
pub(crate) struct ProgressMetrics {
    source_name: String,
    total_size: u64,
    total_bytes: u64,
    total_records: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("total_bytes", &self.total_bytes)
            .field("total_records", &self.total_records)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 A visible bar. indicatif stays quiet on its own when stderr isn't a terminal.
    pub(crate) fn new(source_name: String, total_size: u64) -> Self {
        let progress_bar = ProgressBar::new(total_size);
        // -- 🐛 the template is a literal; if it ever fails to parse we fall back to the default look
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
            progress_bar.set_style(style.progress_chars("=>-"));
        }
        Self::with_bar(source_name, total_size, progress_bar)
    }

    /// 🙈 Same bookkeeping, nothing drawn. For `progress = false` and for tests.
    pub(crate) fn hidden(source_name: String, total_size: u64) -> Self {
        Self::with_bar(source_name, total_size, ProgressBar::hidden())
    }

    fn with_bar(source_name: String, total_size: u64, progress_bar: ProgressBar) -> Self {
        Self {
            source_name,
            total_size,
            total_bytes: 0,
            total_records: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// 🔄 Add what was read since the last call, then redraw.
    pub(crate) fn update(&mut self, bytes_read: u64, records_read: u64) {
        self.total_bytes += bytes_read;
        self.total_records += records_read;
        self.render();
        self.progress_bar.set_position(self.total_bytes);
    }

    /// ✅ Ring the bell. We hit EOF.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    pub(crate) fn total_records(&self) -> u64 {
        self.total_records
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// 🎨 Two rows, two columns, no borders:
    /// ```text
    /// source: <name>
    ///   <records/s>   <records>
    ///   <elapsed>     <bytes / total (percent)>
    /// ```
    fn render(&self) {
        let elapsed = self.start_time.elapsed();
        let secs = elapsed.as_secs_f64();
        let records_per_sec = if secs > 0.0 {
            (self.total_records as f64 / secs) as u64
        } else {
            0
        };
        let percent = if self.total_size > 0 {
            (self.total_bytes as f64 / self.total_size as f64) * 100.0
        } else {
            0.0
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} records/s", format_number(records_per_sec)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{} records", format_number(self.total_records)))
                .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} ({:.1}%)",
                format_bytes(self.total_bytes),
                format_bytes(self.total_size),
                percent
            ))
            .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("source: {}\n{}", self.source_name, table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_numbers_get_their_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_bytes_pick_a_sensible_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        assert_eq!(format_bytes(3 * MIB), "3.00 MiB");
    }

    #[test]
    fn the_one_where_long_runs_grow_an_hours_column() {
        assert_eq!(format_duration(Duration::from_secs(65)), "01:05");
        assert_eq!(format_duration(Duration::from_secs(3723)), "01:02:03");
    }

    #[test]
    fn the_one_where_updates_accumulate() {
        let mut metrics = ProgressMetrics::hidden("IOT-temp.csv".into(), 100);
        metrics.update(40, 2);
        metrics.update(60, 3);
        assert_eq!(metrics.total_bytes(), 100);
        assert_eq!(metrics.total_records(), 5);
        metrics.finish();
    }
}
