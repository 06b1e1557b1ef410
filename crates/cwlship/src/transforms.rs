//! 🔄 Transforms: one export line in, one `_bulk` body out (or a polite "that wasn't data").
//!
//! 🎬 COLD OPEN: INT. S3 BUCKET. A GZIP FILE THE SIZE OF A SMALL MOON.
//!
//! Somebody exported a month of CloudWatch Logs. Each line is a CSV prefix wearing a JSON
//! payload as a hat, and the hat has had every one of its double quotes doubled, because
//! CSV. Our job: take the hat off, un-double the quotes, staple on five `@` fields, and
//! work out which daily index the whole thing belongs in.
//!
//! ```text
//!   2023-05-01 00:00:00.000,123456789012:/aws/lambda/api,stream1,"{""domain"":""acme"",...}"
//!   └──────────── CSV prefix: owner, log group, stream ──────────┘└─ escaped payload ─┘
//!                                       │
//!                                       ▼
//!   {"index":{"_index":"cwl-prod-acme-stream1-2023.05.01"}}
//!   {"domain":"acme",...,"@timestamp":"...","@message":"...","@owner":"...",...}
//! ```
//!
//! ## Knowledge Graph 🧠
//! - Ingest side: `cloudwatch_export` (line → [`LogEvent`])
//! - Egress side: `opensearch_bulk` ([`LogEvent`] → index name + two-line body)
//! - Used by: the ship worker, once per line, strictly in file order
//! - Pure. No I/O, no clock. The event's own `logDate` decides the index, never wall time.
//!
//! 🦆

use memchr::memmem;

use crate::common::BulkAction;

pub(crate) mod cloudwatch_export;
pub(crate) mod opensearch_bulk;

/// 🎯 The doubled-quote key that opens every embedded payload. No marker, no data.
pub const DATA_MARKER: &str = r#"{""domain"""#;

/// 💀 Every way a data line can refuse to become a document. Each one abandons just the one
/// line; the pipeline shrugs and reads the next.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("💀 the embedded payload is not valid JSON after un-doubling the quotes: {0}")]
    MalformedPayload(String),
    #[error("💀 the embedded payload parsed, but it's not a JSON object. We can't staple @ fields onto a {0}.")]
    PayloadNotAnObject(&'static str),
    #[error("💀 the CSV prefix has no field {position}. Expected `<time>,<account:log-group>,<log-stream>,` before the payload.")]
    MissingPrefixField { position: usize },
    #[error("💀 prefix field 1 should look like `account-id:log-group`, got '{0}'")]
    MalformedLogGroup(String),
    #[error("💀 the payload has no usable `{0}` field, and we need it to pick an index")]
    MissingField(&'static str),
    #[error("💀 the payload's `logDate` ({0}) is not a date we can read")]
    UnparseableDate(String),
    #[error("💀 failed to serialize the bulk body: {0}")]
    Serialize(String),
}

/// 🔎 Is there a payload in here at all? SIMD says yes or no before you finish blinking.
pub fn is_data_line(line: &str) -> bool {
    find_marker(line).is_some()
}

fn find_marker(line: &str) -> Option<usize> {
    memmem::find(line.as_bytes(), DATA_MARKER.as_bytes())
}

/// 🔄 The line transformer. Holds the only piece of config it needs: the deployment tag that
/// goes into every index name.
#[derive(Debug, Clone)]
pub struct LineTransformer {
    app_env: String,
}

impl LineTransformer {
    pub fn new(app_env: impl Into<String>) -> Self {
        Self {
            app_env: app_env.into(),
        }
    }

    /// 🔄 Turn a raw export line into its `_bulk` body.
    ///
    /// - `Ok(None)`: not a data line (header, noise). Not an error.
    /// - `Ok(Some(action))`: index name + the two-line body.
    /// - `Err(..)`: it looked like data but fell apart on closer inspection.
    pub fn transform(&self, line: &str) -> Result<Option<BulkAction>, TransformError> {
        let Some(marker_at) = find_marker(line) else {
            return Ok(None);
        };

        let event = cloudwatch_export::parse_line(line, marker_at)?;
        let index_name = opensearch_bulk::index_name(
            &self.app_env,
            &event.domain,
            &event.log_stream,
            &event.event_time,
        );
        let body = opensearch_bulk::render_body(&index_name, &event)?;

        Ok(Some(BulkAction { index_name, body }))
    }
}
