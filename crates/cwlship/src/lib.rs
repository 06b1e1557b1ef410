//! 🚚 cwlship: CloudWatch Logs exports in, date-partitioned OpenSearch indices out.
//!
//! 🎬 *[narrator voice]* "It all started with a gzip file and a deadline..."
//!
//! One line of the export becomes (at most) one SigV4-signed `POST /_bulk`, and the POSTs
//! go out one at a time, in file order. Nothing about a line's failure stops the next line.
//!
//! ```text
//!   export.csv(.gz) ─▶ FileSource ─▶ [queue] ─▶ LineTransformer ─▶ RequestSigner ─▶ OpenSearch
//!                                                     │                                 │
//!                                                     └──────── RunSummary ◀────────────┘
//! ```
//!
//! 🦆

use anyhow::Result;
use tracing::info;

pub mod app_config;
pub(crate) mod backends;
pub mod common;
pub(crate) mod progress;
pub mod signing;
pub(crate) mod supervisors;
pub mod transforms;

pub use backends::{BulkError, BulkResponse, BulkSuccess};
pub use common::RunSummary;

use crate::app_config::AppConfig;
use crate::backends::{
    DeadLetterFile, FileSource, OpenSearchEndpoint, OpenSearchSink, SinkBackend, SourceBackend,
};
use crate::signing::{RequestSigner, SigningScope};
use crate::supervisors::Supervisor;
use crate::transforms::LineTransformer;

/// 🚀 Ship one export file, start to finish.
///
/// `Err` is reserved for things that stop the whole run: bad endpoint, unresolvable signing
/// scope, an unreadable input file, an unwritable dead-letter file. Per-line trouble is
/// counted in the returned [`RunSummary`] instead.
pub async fn run(app_config: AppConfig) -> Result<RunSummary> {
    let endpoint = OpenSearchEndpoint::parse(&app_config.sink.endpoint)?;
    let scope = SigningScope::resolve(
        endpoint.authority(),
        app_config.sink.region.as_deref(),
        app_config.sink.service.as_deref(),
    )?;
    info!(
        "🚚 shipping '{}' to {} ({}/{}) as env '{}'",
        app_config.source.file_name,
        endpoint.authority(),
        scope.region,
        scope.service,
        app_config.app_env
    );

    let signer = RequestSigner::new(endpoint.authority(), scope, app_config.sink.credentials.clone());
    let transformer = LineTransformer::new(app_config.app_env.as_str());

    let source = SourceBackend::File(FileSource::new(
        app_config.source.clone(),
        app_config.runtime.show_progress,
    )?);
    let sink = SinkBackend::OpenSearch(OpenSearchSink::new(&app_config.sink, endpoint)?);
    let dead_letter = match &app_config.runtime.dead_letter_file {
        Some(path) => Some(DeadLetterFile::open(path).await?),
        None => None,
    };

    let summary = Supervisor::new(app_config.runtime.clone(), transformer, signer)
        .run(source, sink, dead_letter)
        .await?;

    info!(
        "🏁 done: {} line(s) read, {} shipped, {} abandoned",
        summary.lines_read,
        summary.shipped,
        summary.abandoned()
    );
    Ok(summary)
}
