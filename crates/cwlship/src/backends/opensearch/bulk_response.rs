//! 🩺 Bulk response triage: was it a clean landing, a partial crash, or a full explosion?
//!
//! The `_bulk` endpoint answers with a status and a JSON body that includes one entry per
//! action in `items`. For us that's always one entry, but we count like there could be more,
//! because the service doesn't know we're being modest.

use serde::Serialize;
use serde_json::Value;

/// ✅ How many actions went in and how many stuck.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSuccess {
    pub attempted_items: u64,
    pub successful_items: u64,
    pub failed_items: u64,
}

/// 💀 The part worth logging when things went wrong. `items` is stripped from the body,
/// because one bad afternoon shouldn't produce a megabyte log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkError {
    pub status_code: u16,
    pub response_body: Value,
}

/// 📨 One classified response. Success summary and error can both show up at once
/// (status 200 with `errors: true` is the classic).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkResponse {
    pub status: u16,
    pub success: Option<BulkSuccess>,
    pub error: Option<BulkError>,
}

impl BulkResponse {
    /// 🩺 Classify a completed response.
    ///
    /// - success summary when `200 <= status < 299`
    /// - error object when `status != 200` or the body says `"errors": true`
    ///
    /// A body that isn't JSON is kept as a JSON string so it still shows up in the logs.
    pub fn classify(status: u16, body: &[u8]) -> Self {
        let mut info: Value = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));

        let success = (200..299).contains(&status).then(|| {
            let items = info.get("items").and_then(Value::as_array);
            let attempted_items = items.map_or(0, |items| items.len() as u64);
            let failed_items = items.map_or(0, |items| {
                items
                    .iter()
                    .filter(|item| item_status(item).is_some_and(|s| s >= 300))
                    .count() as u64
            });
            BulkSuccess {
                attempted_items,
                successful_items: attempted_items - failed_items,
                failed_items,
            }
        });

        let errors_flagged = info.get("errors").and_then(Value::as_bool) == Some(true);
        let error = (status != 200 || errors_flagged).then(|| {
            if let Some(object) = info.as_object_mut() {
                object.retain(|key, _| key != "items");
            }
            BulkError {
                status_code: status,
                response_body: info,
            }
        });

        Self {
            status,
            success,
            error,
        }
    }

    /// 🎯 Clean means: no error object, at least one item confirmed, and no item left behind.
    ///
    /// An empty body, a proxy's HTML page or a `{}` can all arrive with a 200. None of them
    /// confirm anything, so none of them are clean.
    pub fn is_clean(&self) -> bool {
        self.error.is_none()
            && self
                .success
                .is_some_and(|s| s.attempted_items > 0 && s.failed_items == 0)
    }
}

// -- items look like {"index":{"status":201,...}}. a flat {"status":201} is accepted too.
fn item_status(item: &Value) -> Option<u64> {
    if let Some(status) = item.get("status").and_then(Value::as_u64) {
        return Some(status);
    }
    item.as_object()?
        .values()
        .find_map(|action| action.get("status").and_then(Value::as_u64))
}
