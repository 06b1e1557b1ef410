//! 📡 OpenSearch backend: signed `_bulk` POSTs and the triage of whatever comes back.

mod bulk_response;
mod opensearch_sink;

pub use bulk_response::{BulkError, BulkResponse, BulkSuccess};
pub use opensearch_sink::OpenSearchSinkConfig;
pub(crate) use opensearch_sink::{OpenSearchEndpoint, OpenSearchSink};
