//! 📦 Common data structures: the things that ride the conveyor belt between the line reader
//! and the `_bulk` endpoint.
//!
//! 🎬 Each of these lives for exactly one line. Born when the line is read, gone when the
//! POST settles. Mayflies with serde derives. The only thing that outlives a line is the
//! [`RunSummary`], which the ship worker keeps like a tally on a prison wall.
//!
//! 🦆

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// 🏷️ Who and where a log line came from, read off the CSV prefix of an export line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupAttributes {
    /// the account id, i.e. everything before the first `:` of prefix field 1
    pub owner: String,
    pub log_group: String,
    pub log_stream: String,
}

/// 📄 The document that lands in the index: the original payload plus five `@` fields.
///
/// The payload is passed through untouched apart from the injected keys, which always win
/// if the payload happened to carry them already.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    #[serde(rename = "@message")]
    pub message: String,
    #[serde(rename = "@owner")]
    pub owner: String,
    #[serde(rename = "@log_group")]
    pub log_group: String,
    #[serde(rename = "@log_stream")]
    pub log_stream: String,
    /// `domain` from the payload, kept on the side for index routing
    #[serde(skip)]
    pub domain: String,
    /// `logDate` from the payload, parsed. Drives both `@timestamp` and the index date.
    #[serde(skip)]
    pub event_time: DateTime<Utc>,
}

/// 📬 One line's worth of `_bulk` request: where it goes and the exact bytes to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAction {
    pub index_name: String,
    /// always exactly two `\n`-terminated JSON documents: the action, then the event
    pub body: String,
}

/// 📊 What happened over one run. Owned by the ship worker alone, so no locks, no atomics,
/// no drama.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub lines_read: u64,
    /// header lines and other noise without the payload marker
    pub not_data: u64,
    /// lines whose POST came back clean
    pub shipped: u64,
    /// data lines that never became a signed request
    pub transform_errors: u64,
    pub transport_errors: u64,
    /// got a response, but not one that confirmed the line landed
    pub protocol_errors: u64,
    /// per-item failures reported inside otherwise successful responses
    pub failed_items: u64,
}

impl RunSummary {
    /// 💀 everything that was data but never made it into the index
    pub fn abandoned(&self) -> u64 {
        self.transform_errors + self.transport_errors + self.protocol_errors
    }
}
