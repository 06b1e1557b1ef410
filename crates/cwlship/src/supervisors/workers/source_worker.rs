//! 🚰 The SourceWorker: reads lines, numbers them, pushes them down the channel, and blocks
//! (politely, on the blocking pool) whenever the ship worker falls behind.

use anyhow::Result;
use async_channel::Sender;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{NumberedLine, Worker};
use crate::backends::{Source, SourceBackend};

#[derive(Debug)]
pub(crate) struct SourceWorker {
    tx: Sender<NumberedLine>,
    source: SourceBackend,
}

impl SourceWorker {
    pub(crate) fn new(tx: Sender<NumberedLine>, source: SourceBackend) -> Self {
        Self { tx, source }
    }
}

impl Worker for SourceWorker {
    /// how many lines made it into the channel
    type Output = u64;

    fn start(mut self) -> JoinHandle<Result<u64>> {
        tokio::task::spawn_blocking(move || {
            debug!("🚰 SourceWorker started reading...");
            let mut number = 0u64;
            while let Some(text) = self.source.next_line()? {
                number += 1;
                if self.tx.send_blocking(NumberedLine { number, text }).is_err() {
                    // -- the ship worker is gone. nobody is listening. stop talking.
                    debug!("🛑 SourceWorker: channel closed after line {}. Stopping early.", number);
                    return Ok(number - 1);
                }
            }
            // -- dropping tx here closes the channel, which is how the ship worker learns it's done
            debug!("🏁 SourceWorker: end of input after {} line(s)", number);
            Ok(number)
        })
    }
}
