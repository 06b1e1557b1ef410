//! 📥 CloudWatch export ingest: CSV prefix + doubled-quote JSON → [`LogEvent`].
//!
//! The export format is a CSV row whose last column is a JSON document with every `"`
//! doubled and the whole thing wrapped in one more pair of quotes. We don't run a CSV
//! parser over it. We find the marker, chop, un-double, parse. Like peeling an orange
//! with a butter knife: inelegant, but you get the orange.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::TransformError;
use crate::common::{LogEvent, LogGroupAttributes};

const INJECTED_KEYS: [&str; 5] = ["@timestamp", "@message", "@owner", "@log_group", "@log_stream"];

/// 🔪 Split a data line at the marker and build the event. `marker_at` is the byte offset of
/// the payload marker, already located by the caller.
pub(crate) fn parse_line(line: &str, marker_at: usize) -> Result<LogEvent, TransformError> {
    let payload = extract_payload(&line[marker_at..])?;
    let attributes = parse_log_group_attributes(&line[..marker_at])?;
    build_event(payload, attributes)
}

/// 🧽 From the marker to the end, minus the closing CSV quote, with `""` un-doubled.
pub(crate) fn extract_payload(tail: &str) -> Result<Map<String, Value>, TransformError> {
    // -- drop exactly one trailing character, whatever it is. char-aware, so a multibyte
    // -- last character doesn't get sliced in half.
    let without_delimiter = match tail.char_indices().last() {
        Some((last_char_at, _)) => &tail[..last_char_at],
        None => tail,
    };
    let unescaped = without_delimiter.replace(r#""""#, r#"""#);

    match serde_json::from_str::<Value>(&unescaped) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(other) => Err(TransformError::PayloadNotAnObject(json_kind(&other))),
        Err(e) => Err(TransformError::MalformedPayload(e.to_string())),
    }
}

/// 🏷️ Fields 1 and 2 of the comma-split prefix: `account:log-group` and the stream name.
pub(crate) fn parse_log_group_attributes(prefix: &str) -> Result<LogGroupAttributes, TransformError> {
    let fields: Vec<&str> = prefix.split(',').collect();
    let field = |position: usize| {
        fields
            .get(position)
            .copied()
            .filter(|f| !f.is_empty())
            .ok_or(TransformError::MissingPrefixField { position })
    };

    let owner_and_group = field(1)?;
    let log_stream = field(2)?;
    let (owner, log_group) = owner_and_group
        .split_once(':')
        .ok_or_else(|| TransformError::MalformedLogGroup(owner_and_group.to_string()))?;

    Ok(LogGroupAttributes {
        owner: owner.to_string(),
        log_group: log_group.to_string(),
        log_stream: log_stream.to_string(),
    })
}

fn build_event(
    mut payload: Map<String, Value>,
    attributes: LogGroupAttributes,
) -> Result<LogEvent, TransformError> {
    let domain = match payload.get("domain") {
        Some(Value::String(d)) if !d.is_empty() => d.clone(),
        _ => return Err(TransformError::MissingField("domain")),
    };
    let event_time = parse_log_date(payload.get("logDate").ok_or(TransformError::MissingField("logDate"))?)?;

    // -- @message is the payload exactly as it arrived, keys in arrival order
    let message = serde_json::to_string(&payload).map_err(|e| TransformError::Serialize(e.to_string()))?;

    // -- the injected fields win. a payload that brought its own @timestamp gets it replaced,
    // -- not duplicated (duplicate keys make the index very sad).
    // -- retain, not remove: remove swaps the last key into the hole
    payload.retain(|key, _| !INJECTED_KEYS.contains(&key.as_str()));

    Ok(LogEvent {
        payload,
        timestamp: event_time.to_rfc3339_opts(SecondsFormat::Millis, true),
        message,
        owner: attributes.owner,
        log_group: attributes.log_group,
        log_stream: attributes.log_stream,
        domain,
        event_time,
    })
}

/// 🕰️ Read `logDate` in whatever shape the exporting service felt like that day.
///
/// RFC 3339 first, then a space-separated timestamp, then a bare date (both taken as UTC),
/// then epoch milliseconds as a JSON number.
pub(crate) fn parse_log_date(value: &Value) -> Result<DateTime<Utc>, TransformError> {
    let unreadable = || TransformError::UnparseableDate(value.to_string());

    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                    return Ok(naive.and_utc());
                }
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|naive| naive.and_utc())
                .ok_or_else(unreadable)
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(unreadable),
        _ => Err(unreadable()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
