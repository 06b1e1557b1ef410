//! 🎬 *[a channel fills with numbered lines. somewhere, an OpenSearch domain waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 🚢 The ShipWorker: the only code in the crate allowed to touch the sink. Takes a line,
//! transforms it, signs it, POSTs it, waits for the whole answer, writes it down in the
//! tally, and only then asks the channel for another. That's the single-flight guarantee:
//! not a semaphore, just a worker that refuses to multitask.
//!
//! Every line ends up in exactly one bucket of the [`RunSummary`]:
//!
//! ```text
//!   not a data line ─────────────────────────▶ not_data
//!   transform or signing failed ─────────────▶ transform_errors
//!   POST never came back ────────────────────▶ transport_errors
//!   error response or nothing confirmed ─────▶ protocol_errors
//!   clean response ──────────────────────────▶ shipped
//! ```
//!
//! 🦆 (the duck has no comment at this time)

use anyhow::Result;
use async_channel::Receiver;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{NumberedLine, Worker};
use crate::backends::{BulkResponse, DeadLetterFile, FailureStage, Sink, SinkBackend};
use crate::common::RunSummary;
use crate::signing::RequestSigner;
use crate::transforms::LineTransformer;

#[derive(Debug)]
pub(crate) struct ShipWorker {
    rx: Receiver<NumberedLine>,
    sink: SinkBackend,
    transformer: LineTransformer,
    signer: RequestSigner,
    dead_letter: Option<DeadLetterFile>,
    summary: RunSummary,
}

impl ShipWorker {
    pub(crate) fn new(
        rx: Receiver<NumberedLine>,
        sink: SinkBackend,
        transformer: LineTransformer,
        signer: RequestSigner,
        dead_letter: Option<DeadLetterFile>,
    ) -> Self {
        Self {
            rx,
            sink,
            transformer,
            signer,
            dead_letter,
            summary: RunSummary::default(),
        }
    }

    /// 🔄 One line, start to finish. `Err` only when the dead-letter file can't be written;
    /// everything else is a tally mark.
    async fn ship(&mut self, line: NumberedLine) -> Result<()> {
        self.summary.lines_read += 1;
        let number = line.number;

        let action = match self.transformer.transform(&line.text) {
            Ok(Some(action)) => action,
            Ok(None) => {
                debug!("Line {} - not data, skipping", number);
                self.summary.not_data += 1;
                return Ok(());
            }
            Err(e) => {
                warn!("Line {} - {}", number, e);
                self.summary.transform_errors += 1;
                return self
                    .bury(number, FailureStage::Transform, &e.to_string(), &line.text)
                    .await;
            }
        };

        info!("📤 Line {} - sending POST to {}", number, action.index_name);
        let request = match self.signer.sign_bulk(action.body, &Utc::now()) {
            Ok(request) => request,
            Err(e) => {
                error!("💀 Line {} - couldn't sign the POST to {}: {}", number, action.index_name, e);
                self.summary.transform_errors += 1;
                return self
                    .bury(number, FailureStage::Transform, &e.to_string(), &line.text)
                    .await;
            }
        };

        let response = match self.sink.send(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("💀 Line {} - POST to {} failed: {:#}", number, action.index_name, e);
                self.summary.transport_errors += 1;
                return self
                    .bury(number, FailureStage::Transport, &format!("{e:#}"), &line.text)
                    .await;
            }
        };

        match self.tally(number, &action.index_name, &response) {
            Some(reason) => {
                self.bury(number, FailureStage::Protocol, &reason, &line.text)
                    .await
            }
            None => Ok(()),
        }
    }

    /// 📊 Log the response and count it. Returns the failure reason when the line didn't land.
    fn tally(&mut self, number: u64, index_name: &str, response: &BulkResponse) -> Option<String> {
        if let Some(success) = &response.success {
            self.summary.failed_items += success.failed_items;
            info!(
                "✅ Line {} - {}: {} attempted, {} successful, {} failed",
                number, index_name, success.attempted_items, success.successful_items, success.failed_items
            );
        }
        if let Some(bulk_error) = &response.error {
            warn!(
                "💀 Line {} - {} answered with status {}: {}",
                number, index_name, bulk_error.status_code, bulk_error.response_body
            );
        }

        if response.is_clean() {
            self.summary.shipped += 1;
            return None;
        }

        self.summary.protocol_errors += 1;
        Some(match (&response.error, &response.success) {
            (Some(bulk_error), _) => format!(
                "status {}: {}",
                bulk_error.status_code, bulk_error.response_body
            ),
            (None, Some(success)) if success.attempted_items == 0 => {
                warn!(
                    "💀 Line {} - {} answered {} but no items were confirmed. Not counting it as shipped.",
                    number, index_name, response.status
                );
                format!("status {} but no items were confirmed", response.status)
            }
            (None, Some(success)) => format!(
                "{} of {} item(s) failed",
                success.failed_items, success.attempted_items
            ),
            (None, None) => format!("status {}", response.status),
        })
    }

    async fn bury(&mut self, number: u64, stage: FailureStage, reason: &str, line: &str) -> Result<()> {
        match self.dead_letter.as_mut() {
            Some(dead_letter) => dead_letter.record(number, stage, reason, line).await,
            None => Ok(()),
        }
    }
}

impl Worker for ShipWorker {
    type Output = RunSummary;

    fn start(mut self) -> JoinHandle<Result<RunSummary>> {
        tokio::spawn(async move {
            debug!("📥 ShipWorker started draining channel...");
            // -- recv() errs only once the channel is empty AND closed, so nothing is left behind
            while let Ok(line) = self.rx.recv().await {
                self.ship(line).await?;
            }

            debug!("🏁 ShipWorker: channel closed. Closing up shop.");
            self.sink.close().await?;
            if let Some(dead_letter) = self.dead_letter.as_mut() {
                dead_letter.close().await?;
            }
            Ok(self.summary)
        })
    }
}
