//! 🧠 In-memory stunt doubles for the source and the sink.
//!
//! The source is a Vec of lines wearing a file costume. The sink records every request it
//! gets, answers from a script, and keeps count of how many requests were ever in flight at
//! the same time, which had better be one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{BulkResponse, Sink, Source};
use crate::signing::SignedRequest;

const CLEAN_REPLY: &str = r#"{"took":1,"errors":false,"items":[{"index":{"status":201}}]}"#;

#[derive(Debug, Default)]
pub(crate) struct InMemorySource {
    lines: VecDeque<String>,
}

impl InMemorySource {
    pub(crate) fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl Source for InMemorySource {
    fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

/// 🎬 What the sink says next.
#[derive(Debug, Clone)]
pub(crate) enum InMemoryReply {
    Respond { status: u16, body: String },
    TransportFailure(String),
}

/// 📥 Records requests, replays scripted replies (a clean 200 once the script runs out),
/// and tracks the in-flight high-water mark.
///
/// Clones share state, so a test keeps one handle and gives the other to the pipeline.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemorySink {
    received: Arc<Mutex<Vec<SignedRequest>>>,
    replies: Arc<Mutex<VecDeque<InMemoryReply>>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// ⏳ Make every request take a while, so overlapping requests would actually overlap.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) async fn script(&self, reply: InMemoryReply) {
        self.replies.lock().await.push_back(reply);
    }

    pub(crate) async fn received(&self) -> Vec<SignedRequest> {
        self.received.lock().await.clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn times_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn send(&mut self, request: SignedRequest) -> Result<BulkResponse> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.received.lock().await.push(request);
        let reply = self.replies.lock().await.pop_front();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match reply {
            Some(InMemoryReply::Respond { status, body }) => {
                Ok(BulkResponse::classify(status, body.as_bytes()))
            }
            Some(InMemoryReply::TransportFailure(reason)) => Err(anyhow!(reason)),
            None => Ok(BulkResponse::classify(200, CLEAN_REPLY.as_bytes())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
