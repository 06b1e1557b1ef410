//! 📡 OpenSearch bulk egress: [`LogEvent`] → daily index name + the sacred two-line body.
//!
//! Rule 1: Two lines per document. Action metadata, then the document. Always.
//! Rule 2: Newline-delimited, and the body ends with a newline. It MATTERS.
//! Rule 3: One line of input, one action. We don't batch. We don't negotiate.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::TransformError;
use crate::common::LogEvent;

#[derive(Serialize)]
struct BulkIndexAction<'a> {
    index: BulkIndexTarget<'a>,
}

#[derive(Serialize)]
struct BulkIndexTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
}

/// 🗓️ `cwl-{env}-{domain}-{stream}-{YYYY.MM.DD}`, dated by the event, never by the clock.
pub(crate) fn index_name(
    app_env: &str,
    domain: &str,
    log_stream: &str,
    event_time: &DateTime<Utc>,
) -> String {
    format!(
        "cwl-{app_env}-{domain}-{log_stream}-{}",
        event_time.format("%Y.%m.%d")
    )
}

/// 📦 `{"index":{"_index":"..."}}\n{...event...}\n`
pub(crate) fn render_body(index_name: &str, event: &LogEvent) -> Result<String, TransformError> {
    let action = BulkIndexAction {
        index: BulkIndexTarget { index: index_name },
    };
    let serialize = |e: serde_json::Error| TransformError::Serialize(e.to_string());

    let action_line = serde_json::to_string(&action).map_err(serialize)?;
    let document_line = serde_json::to_string(event).map_err(serialize)?;

    let mut body = String::with_capacity(action_line.len() + document_line.len() + 2);
    body.push_str(&action_line);
    body.push('\n');
    body.push_str(&document_line);
    body.push('\n');
    Ok(body)
}
