//! 📊 progress.rs: "Are we there yet?", asked once per export line, forever.
//!
//! 🚀 Bytes read, lines read, how fast, how long until the file runs out. Rendered as a
//! borderless comfy-table glued on top of an indicatif bar, drawn on stderr so the logs
//! keep stdout to themselves.
//!
//! ⚠️ Watching this progress bar will not make the POSTs go faster. One at a time means
//! one at a time. Science says no.

use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
// -- 🎨 a redraw per line would spend more time painting than shipping
const RENDER_EVERY: Duration = Duration::from_millis(250);
// -- how much a fresh sample moves the smoothed rate. one slow POST shouldn't flatline it.
const SMOOTHING: f64 = 0.3;
const UNKNOWN: &str = "--:--";

/// 📦 "1073741824 bytes" is a war crime in a UI. Each value picks its own unit.
fn format_bytes(bytes: u64) -> String {
    if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} bytes")
    }
}

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, minutes, seconds) => format!("{minutes:02}:{seconds:02}"),
        (hours, minutes, seconds) => format!("{hours:02}:{minutes:02}:{seconds:02}"),
    }
}

/// 📊 Running totals for the source reader, plus a smoothed read rate.
///
/// Hidden unless asked for. A hidden bar still counts; it just keeps its opinions to itself.
pub(crate) struct ProgressMetrics {
    source_name: String,
    /// 📏 0 when we have no idea (gzip input: the compressed size says nothing about lines)
    total_size: u64,
    total_bytes: u64,
    total_lines: u64,
    progress_bar: ProgressBar,
    visible: bool,
    start_time: Instant,
    /// when, and at what totals, the last redraw happened
    last_sample: (Instant, u64, u64),
    lines_per_sec: f64,
    bytes_per_sec: f64,
}

impl std::fmt::Debug for ProgressMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- ProgressBar doesn't derive Debug, and printing one would be a choice anyway
        f.debug_struct("ProgressMetrics")
            .field("source_name", &self.source_name)
            .field("total_size", &self.total_size)
            .field("total_bytes", &self.total_bytes)
            .field("total_lines", &self.total_lines)
            .field("visible", &self.visible)
            .finish()
    }
}

impl ProgressMetrics {
    /// 🚀 `total_size` of 0 means "unknown". `visible: false` keeps the terminal clean.
    pub(crate) fn new(source_name: String, total_size: u64, visible: bool) -> Self {
        let progress_bar = if visible {
            let bar = ProgressBar::new(total_size);
            // -- a template that won't parse just means the default look
            if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}]") {
                bar.set_style(style.progress_chars("=>-"));
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        let start_time = Instant::now();
        Self {
            source_name,
            total_size,
            total_bytes: 0,
            total_lines: 0,
            progress_bar,
            visible,
            start_time,
            last_sample: (start_time, 0, 0),
            lines_per_sec: 0.0,
            bytes_per_sec: 0.0,
        }
    }

    /// 🔄 Count what was just read. Redraws at most every 250ms, and never when hidden.
    pub(crate) fn update(&mut self, bytes_read: u64, lines_read: u64) {
        self.total_bytes += bytes_read;
        self.total_lines += lines_read;

        if !self.visible {
            return;
        }
        let now = Instant::now();
        if now.duration_since(self.last_sample.0) < RENDER_EVERY {
            return;
        }

        self.sample(now);
        self.progress_bar.set_message(self.render());
        self.progress_bar.set_position(self.total_bytes);
    }

    pub(crate) fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub(crate) fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// ✅ EOF. Ring the bell.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    fn sample(&mut self, now: Instant) {
        let (then, bytes_then, lines_then) = self.last_sample;
        let elapsed = now.duration_since(then).as_secs_f64();
        if elapsed > 0.0 {
            let lines_now = self.total_lines.saturating_sub(lines_then) as f64 / elapsed;
            let bytes_now = self.total_bytes.saturating_sub(bytes_then) as f64 / elapsed;
            self.lines_per_sec += SMOOTHING * (lines_now - self.lines_per_sec);
            self.bytes_per_sec += SMOOTHING * (bytes_now - self.bytes_per_sec);
        }
        self.last_sample = (now, self.total_bytes, self.total_lines);
    }

    fn percent_done(&self) -> Option<f64> {
        (self.total_size > 0).then(|| self.total_bytes as f64 / self.total_size as f64 * 100.0)
    }

    /// 🔮 Bytes left over the smoothed rate. Unknown size or a stalled rate means no guess.
    fn remaining(&self) -> Option<Duration> {
        if self.total_size == 0 || self.bytes_per_sec <= 0.0 {
            return None;
        }
        let bytes_left = self.total_size.saturating_sub(self.total_bytes) as f64;
        Some(Duration::from_secs_f64(bytes_left / self.bytes_per_sec))
    }

    /// 🎨 `source: <name>` over three rows: lines, bytes, time.
    fn render(&self) -> String {
        let bytes_progress = match self.percent_done() {
            Some(percent) => format!(
                "{} / {} ({percent:.1}%)",
                format_bytes(self.total_bytes),
                format_bytes(self.total_size)
            ),
            None => format_bytes(self.total_bytes),
        };
        let remaining = self
            .remaining()
            .map_or_else(|| UNKNOWN.to_string(), format_duration);

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let right = |text: String| Cell::new(text).set_alignment(CellAlignment::Right);
        table.add_row(vec![
            right(format!("{} lines/s", format_number(self.lines_per_sec as u64))),
            right(format!("{} lines", format_number(self.total_lines))),
        ]);
        table.add_row(vec![
            right(format!("{}/s", format_bytes(self.bytes_per_sec as u64))),
            right(bytes_progress),
        ]);
        table.add_row(vec![
            right(format!("{} elapsed", format_duration(self.start_time.elapsed()))),
            right(format!("{remaining} remaining")),
        ]);

        format!("source: {}\n{table}", self.source_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_big_numbers_get_commas() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn the_one_where_durations_grow_an_hour_column_only_when_needed() {
        assert_eq!(format_duration(Duration::from_secs(75)), "01:15");
        assert_eq!(format_duration(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn the_one_where_every_size_wears_the_right_unit() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.00 KiB");
        // -- a 3 MiB file used to be reported as 3072.00 "KiB" with MiB digits
        assert_eq!(format_bytes(3 * MIB), "3.00 MiB");
        assert_eq!(format_bytes(MIB + MIB / 2), "1.50 MiB");
    }

    #[test]
    fn the_one_where_the_panel_reports_progress_against_a_known_size() {
        let mut progress = ProgressMetrics::new("export.csv".to_string(), 4 * MIB, false);
        progress.update(MIB, 10);

        let panel = progress.render();
        assert!(panel.starts_with("source: export.csv"), "{panel}");
        assert!(panel.contains("1.00 MiB / 4.00 MiB (25.0%)"), "{panel}");
        assert!(panel.contains("10 lines"), "{panel}");
        // -- no redraw has happened yet, so there's no rate to extrapolate from
        assert!(panel.contains("--:-- remaining"), "{panel}");
    }

    #[test]
    fn the_one_where_a_gzip_source_shows_bytes_without_a_percentage() {
        let mut progress = ProgressMetrics::new("export.csv.gz".to_string(), 0, false);
        progress.update(2048, 1);
        let panel = progress.render();
        assert!(panel.contains("2.00 KiB"), "{panel}");
        assert!(!panel.contains('%'), "{panel}");
    }

    #[test]
    fn the_one_where_a_hidden_bar_still_counts() {
        let mut progress = ProgressMetrics::new("export.csv".to_string(), 100, false);
        progress.update(40, 1);
        progress.update(60, 2);
        assert_eq!(progress.total_bytes(), 100);
        assert_eq!(progress.total_lines(), 3);
        progress.finish();
    }
}
