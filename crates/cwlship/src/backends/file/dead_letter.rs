use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    fs::{File, OpenOptions},
    io::{self, AsyncWriteExt},
};
use tracing::{debug, trace};

/// 🪦 Where in the pipeline a line gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FailureStage {
    /// looked like data, never became a signed request
    Transform,
    /// the POST never got a response
    Transport,
    /// the POST got a response, and the response was bad news
    Protocol,
}

#[derive(Serialize)]
struct DeadLetterRecord<'a> {
    line_number: u64,
    stage: FailureStage,
    reason: &'a str,
    line: &'a str,
}

/// 🪦 DeadLetterFile: an NDJSON ledger of lines that never made it into the index.
///
/// One record per abandoned line: `{"line_number":..,"stage":..,"reason":..,"line":..}`.
/// Opened in append mode, so re-running a file against the same ledger adds to it instead
/// of quietly erasing the last run's casualties.
///
/// BufWriter, because one syscall per bad line is a war crime on a bad day.
#[derive(Debug)]
pub(crate) struct DeadLetterFile {
    file_buf: io::BufWriter<File>,
    path: PathBuf,
    records: u64,
}

impl DeadLetterFile {
    pub(crate) async fn open(path: &Path) -> Result<Self> {
        let file_handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| {
                format!(
                    "💀 The dead-letter file '{}' could not be opened. We stared at the path. \
                     The path stared back. One of us was wrong about whether the parent directory existed.",
                    path.display()
                )
            })?;
        debug!("🪦 dead-letter file open at '{}'", path.display());
        Ok(Self {
            file_buf: io::BufWriter::new(file_handle),
            path: path.to_path_buf(),
            records: 0,
        })
    }

    /// 📝 Write down one casualty.
    pub(crate) async fn record(
        &mut self,
        line_number: u64,
        stage: FailureStage,
        reason: &str,
        line: &str,
    ) -> Result<()> {
        let record = DeadLetterRecord {
            line_number,
            stage,
            reason,
            line,
        };
        let mut rendered = serde_json::to_vec(&record)
            .context("💀 Failed to serialize a dead-letter record. Even the obituary failed.")?;
        rendered.push(b'\n');

        trace!("🪦 line {} → dead letters ({:?})", line_number, stage);
        self.file_buf.write_all(&rendered).await.with_context(|| {
            format!("💀 Writing to the dead-letter file '{}' failed", self.path.display())
        })?;
        self.records += 1;
        Ok(())
    }

    /// 🗑️ Flush. Explicitly, because async Drop is not a thing yet.
    pub(crate) async fn close(&mut self) -> Result<()> {
        self.file_buf.flush().await.with_context(|| {
            format!(
                "💀 Flushing the dead-letter file '{}' failed. The records were SO CLOSE to the disk.",
                self.path.display()
            )
        })?;
        debug!(
            "🪦 dead-letter file '{}' closed with {} new record(s)",
            self.path.display(),
            self.records
        );
        Ok(())
    }
}
