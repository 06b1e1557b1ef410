//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the credit
//! in the sprint retro.
//!
//! Two of them. One reads, one ships. They talk through a bounded channel and never share
//! anything else. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod ship_worker;
mod source_worker;

pub(super) use ship_worker::ShipWorker;
pub(super) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// `start` consumes the worker and hands back a JoinHandle for whatever it produces when
/// it's done. We trust, but we await.
pub(crate) trait Worker {
    type Output: Send + 'static;

    fn start(self) -> JoinHandle<Result<Self::Output>>;
}

/// 📄 One line off the conveyor belt, numbered from 1 in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NumberedLine {
    pub(crate) number: u64,
    pub(crate) text: String,
}
