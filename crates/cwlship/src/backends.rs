//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 The source pours export lines out of a file. The sink fires signed `_bulk` requests
//! at OpenSearch. In between lives the ship worker, which is the only one allowed to hold
//! the sink, so there's never more than one POST in the air. One. Uno. Not a fleet.
//!
//! 🎭 This module is the casting agency. Real file or a Vec pretending to be one? Real
//! cluster or an in-memory stunt double that counts how many requests it got? Same trait,
//! same contract, the supervisor neither knows nor cares.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;

use crate::signing::SignedRequest;

pub(crate) mod file;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod opensearch;

// 🎯 Re-export the configs and the response so callers say `backends::FileSourceConfig`
// instead of spelunking three modules deep.
pub use file::FileSourceConfig;
pub(crate) use file::{DeadLetterFile, FailureStage, FileSource};
pub use opensearch::{BulkError, BulkResponse, BulkSuccess, OpenSearchSinkConfig};
pub(crate) use opensearch::{OpenSearchEndpoint, OpenSearchSink};

// ===== Source Trait and Backend Enum =====

/// 🚰 A source that produces export lines, one at a time, in file order.
///
/// # Contract
/// - `next_line` returns lines (terminator stripped) until the well runs dry, then `Ok(None)`.
/// - It's synchronous on purpose: it runs on the blocking pool, where a slow disk (or a
///   gzip stream the size of a small moon) can't stall the runtime.
pub(crate) trait Source: std::fmt::Debug + Send {
    /// 📄 The next line, or `None` at end of input. `Err` means the file itself failed us.
    fn next_line(&mut self) -> Result<Option<String>>;
}

/// 🎭 The many faces of a Source.
#[derive(Debug)]
pub(crate) enum SourceBackend {
    File(FileSource),
    #[cfg(test)]
    InMemory(in_mem::InMemorySource),
}

impl Source for SourceBackend {
    fn next_line(&mut self) -> Result<Option<String>> {
        match self {
            SourceBackend::File(f) => f.next_line(),
            #[cfg(test)]
            SourceBackend::InMemory(i) => i.next_line(),
        }
    }
}

// ===== Sink Trait and Backend Enum =====

/// 🕳️ A sink that takes one signed request and reports how it went.
///
/// # Contract
/// - `send` performs exactly one request and resolves once it has fully settled, response
///   body included. `Ok` means a response came back (any status). `Err` means it never
///   did: DNS, TLS, refused connection, timeout.
/// - `close` releases whatever the sink holds. MUST be called. Skipping it is rude.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    /// 📡 Send one signed request, wait for the whole response, classify it.
    async fn send(&mut self, request: SignedRequest) -> Result<BulkResponse>;
    /// 🗑️ Flush, finalize, release.
    async fn close(&mut self) -> Result<()>;
}

/// 🎭 The many faces of a Sink. Mirrors `SourceBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    OpenSearch(OpenSearchSink),
    #[cfg(test)]
    InMemory(in_mem::InMemorySink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn send(&mut self, request: SignedRequest) -> Result<BulkResponse> {
        match self {
            SinkBackend::OpenSearch(sink) => sink.send(request).await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.send(request).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            SinkBackend::OpenSearch(sink) => sink.close().await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.close().await,
        }
    }
}
