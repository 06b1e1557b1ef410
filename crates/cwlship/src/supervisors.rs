//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where POSTs must never overlap..."
//! 🎬 "One supervisor dared to keep them in line."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor wires two workers together with a bounded channel:
//!
//! ```text
//!   SourceWorker (blocking pool)  ──[ bounded channel ]──▶  ShipWorker (async, alone)
//!   reads + numbers lines            queue_capacity           transform → sign → POST → tally
//! ```
//!
//! The reader runs ahead by at most `queue_capacity` lines. The ship worker is the only thing
//! that ever touches the sink, and it awaits every POST before it even looks at the next line.
//! Single-flight and file order fall out of that for free; no locks were harmed.
//!
//! ⚠️ DO NOT MAKE THE WORKERS PUB. Like Fight Club, but for async tasks.

mod workers;

use anyhow::{Context, Result};
use tracing::debug;

use crate::app_config::RuntimeConfig;
use crate::backends::{DeadLetterFile, SinkBackend, SourceBackend};
use crate::common::RunSummary;
use crate::signing::RequestSigner;
use crate::transforms::LineTransformer;
use workers::{ShipWorker, SourceWorker, Worker};

/// 📦 The Supervisor: hovers, waits, collects the tally.
pub(crate) struct Supervisor {
    runtime: RuntimeConfig,
    transformer: LineTransformer,
    signer: RequestSigner,
}

impl Supervisor {
    pub(crate) fn new(runtime: RuntimeConfig, transformer: LineTransformer, signer: RequestSigner) -> Self {
        Self {
            runtime,
            transformer,
            signer,
        }
    }

    /// 🧵 Start both workers, wait for the ship worker to drain the channel, return the tally.
    ///
    /// Per-line failures never surface here; they're counted in the [`RunSummary`]. An `Err`
    /// means the run itself broke: the input file failed mid-read, or the dead-letter file
    /// couldn't be written.
    pub(crate) async fn run(
        self,
        source: SourceBackend,
        sink: SinkBackend,
        dead_letter: Option<DeadLetterFile>,
    ) -> Result<RunSummary> {
        // -- a zero-capacity channel would be a rendezvous channel. we want at least a little slack.
        let capacity = self.runtime.queue_capacity.max(1);
        let (tx, rx) = async_channel::bounded(capacity);
        debug!("🧵 starting workers with a queue of {} line(s)", capacity);

        let source_handle = SourceWorker::new(tx, source).start();
        let ship_handle = ShipWorker::new(rx, sink, self.transformer, self.signer, dead_letter).start();

        let summary = ship_handle
            .await
            .context("💀 The ship worker panicked. The tally went down with it.")??;
        let lines_produced = source_handle
            .await
            .context("💀 The source worker panicked mid-read.")??;

        debug!(
            "🏁 source produced {} line(s), ship worker saw {}",
            lines_produced, summary.lines_read
        );
        Ok(summary)
    }
}
