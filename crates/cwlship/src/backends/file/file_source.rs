use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::backends::Source;
use crate::progress::ProgressMetrics;

/// 📂 Which export to read. `.gz` files are decompressed on the fly.
#[derive(Debug, Deserialize, Clone)]
pub struct FileSourceConfig {
    pub file_name: String,
}

/// 📂 FileSource: reads an export line by line and hands each one over, terminator removed.
///
/// Synchronous `std::io` on purpose: the source worker runs on tokio's blocking pool, and a
/// gzip decoder is happiest with a plain `Read` underneath it anyway.
///
/// Bytes that aren't UTF-8 are replaced rather than rejected. One mangled emoji in a log
/// message shouldn't cost the whole file.
pub(crate) struct FileSource {
    reader: Box<dyn BufRead + Send>,
    source_config: FileSourceConfig,
    line_buf: Vec<u8>,
    progress: ProgressMetrics,
}

// 🐛 the reader is a boxed trait object and the progress bar is a diva. neither gets printed.
impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("source_config", &self.source_config)
            .field("progress", &self.progress)
            .finish()
    }
}

impl FileSource {
    /// 🚀 Open the file, size it up for the progress bar, pick plain or gzip.
    pub(crate) fn new(source_config: FileSourceConfig, show_progress: bool) -> Result<Self> {
        let path = Path::new(&source_config.file_name);
        let file_handle = File::open(path).with_context(|| {
            format!(
                "💀 The export file '{}' could not be opened. We looked. It looked back. \
                 One of us was wrong about whether it exists.",
                source_config.file_name
            )
        })?;

        let gzipped = is_gzip(path);
        // -- the compressed size says nothing useful about decompressed progress, so gzip runs
        // -- get the "unknown total" treatment
        let file_size = if gzipped {
            0
        } else {
            file_handle.metadata().map(|m| m.len()).unwrap_or(0)
        };

        let reader: Box<dyn BufRead + Send> = if gzipped {
            Box::new(BufReader::new(MultiGzDecoder::new(file_handle)))
        } else {
            Box::new(BufReader::new(file_handle))
        };

        debug!(
            "📂 opened '{}' ({}, {} bytes on disk)",
            source_config.file_name,
            if gzipped { "gzip" } else { "plain" },
            file_size
        );

        let progress = ProgressMetrics::new(source_config.file_name.clone(), file_size, show_progress);
        Ok(Self {
            reader,
            source_config,
            line_buf: Vec::with_capacity(8 * 1024),
            progress,
        })
    }
}

impl Source for FileSource {
    fn next_line(&mut self) -> Result<Option<String>> {
        self.line_buf.clear();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.line_buf)
            .with_context(|| {
                format!(
                    "💀 Reading '{}' failed partway through. Truncated gzip, yanked disk, or a cosmic ray. Pick one.",
                    self.source_config.file_name
                )
            })?;

        if bytes_read == 0 {
            self.progress.finish();
            debug!(
                "✅ reached the end of '{}' after {} lines ({} bytes)",
                self.source_config.file_name,
                self.progress.total_lines(),
                self.progress.total_bytes()
            );
            return Ok(None);
        }

        let line = strip_line_terminator(&self.line_buf);
        trace!("📄 read {} bytes", bytes_read);
        self.progress.update(bytes_read as u64, 1);
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

// -- "\n" and "\r\n" both end a line. a lone "\r" in the middle of one is the payload's business.
fn strip_line_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
