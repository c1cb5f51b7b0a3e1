//! Structured log entries shipped to stdout and the log store.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::context::TraceContext;

/// Placeholder some runtimes write when no trace id was found.
pub const TRACE_ID_PLACEHOLDER: &str = "not-found";

pub const FIELD_TIME: &str = "_time";
pub const FIELD_LEVEL: &str = "level";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_TRACE_ID: &str = "trace_id";
pub const FIELD_REQUEST_ID: &str = "aws_request_id";
pub const FIELD_CONTAINER: &str = "container_name";
pub const FIELD_JOB: &str = "job";

/// Severity of an emitted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
}

impl Level {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Map a bracketed tag such as `WARN` or `crit` to a level.
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "DEBUG" | "TRACE" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARN" | "WARNING" => Some(Self::Warning),
            "ERROR" | "CRIT" | "CRITICAL" => Some(Self::Error),
            _ => None,
        }
    }

    /// Level of a message forwarded from a log batch.
    ///
    /// Rules are checked in order and the first match wins: a `[DEBUG]` tag or
    /// a ` TRACE` keyword, then a `[WARN]` tag or `WARN` anywhere, then an
    /// `[ERROR]` tag or `ERROR`/`CRIT` anywhere. Everything else is INFO.
    pub fn from_tagged_message(message: &str) -> Self {
        let upper = message.to_uppercase();
        if upper.starts_with("[DEBUG]") || upper.contains(" TRACE") {
            Self::Debug
        } else if upper.starts_with("[WARN") || upper.contains("WARN") {
            Self::Warning
        } else if upper.starts_with("[ERROR]") || upper.contains("ERROR") || upper.contains("CRIT")
        {
            Self::Error
        } else {
            Self::Info
        }
    }

    /// Level of a raw, unstructured output line.
    pub fn from_raw_line(line: &str) -> Self {
        let upper = line.to_uppercase();
        if upper.contains("ERROR") || upper.contains("CRIT") {
            Self::Error
        } else if upper.contains("WARN") {
            Self::Warning
        } else if upper.contains("DEBUG") || upper.contains("TRACE") {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remove a leading `[TAG]` naming `level` from a message.
///
/// Tags naming a different level are left in place.
pub fn strip_level_tag(message: &str, level: Level) -> &str {
    let trimmed = message.trim_start();
    let Some(rest) = trimmed.strip_prefix('[') else {
        return message;
    };
    let Some((tag, tail)) = rest.split_once(']') else {
        return message;
    };
    if Level::from_tag(tag) == Some(level) {
        tail.trim()
    } else {
        message
    }
}

/// Format a timestamp for the `_time` field.
pub fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Format epoch milliseconds for the `_time` field, falling back to now.
pub fn format_millis(millis: Option<i64>) -> String {
    let time = millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);
    format_time(time)
}

/// An ordered JSON object describing one log record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntry(Map<String, Value>);

impl LogEntry {
    /// An entry with the three required fields set.
    pub fn new(time: impl Into<String>, level: Level, message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(FIELD_TIME.to_owned(), Value::String(time.into()));
        map.insert(FIELD_LEVEL.to_owned(), Value::String(level.as_str().to_owned()));
        map.insert(FIELD_MESSAGE.to_owned(), Value::String(message.into()));
        Self(map)
    }

    /// Parse a line as a JSON object. Non-objects and empty objects yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        match serde_json::from_str::<Value>(line.trim()) {
            Ok(Value::Object(map)) if !map.is_empty() => Some(Self(map)),
            _ => None,
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_owned(), value.into());
    }

    /// Insert only when the key is absent.
    pub fn insert_if_absent(&mut self, key: &str, value: impl Into<Value>) {
        if !self.0.contains_key(key) {
            self.0.insert(key.to_owned(), value.into());
        }
    }

    /// Attach trace and request ids from `ctx`.
    ///
    /// `trace_id` replaces an existing value only when that value is empty
    /// or the placeholder. `aws_request_id` is only added when absent.
    pub fn attach_trace(&mut self, ctx: &TraceContext) {
        if let Some(trace_id) = ctx.trace_id() {
            let replaceable = match self.0.get(FIELD_TRACE_ID) {
                None | Some(Value::Null) => true,
                Some(Value::String(existing)) => {
                    existing.is_empty() || existing == TRACE_ID_PLACEHOLDER
                }
                Some(_) => false,
            };
            if replaceable {
                self.insert(FIELD_TRACE_ID, trace_id);
            }
        }
        if let Some(request_id) = ctx.request_id() {
            self.insert_if_absent(FIELD_REQUEST_ID, request_id);
        }
    }

    /// Whether the required fields are present.
    pub fn is_complete(&self) -> bool {
        [FIELD_TIME, FIELD_LEVEL, FIELD_MESSAGE]
            .iter()
            .all(|key| self.0.contains_key(*key))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Single-line JSON rendering.
    pub fn to_json_line(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("[WARN] disk usage high", Level::Warning)]
    #[case("plain text, no tag, mentions ERROR", Level::Error)]
    #[case("[DEBUG] cache miss", Level::Debug)]
    #[case("request TRACE enabled", Level::Debug)]
    #[case("[ERROR] boom", Level::Error)]
    #[case("critical section entered", Level::Error)]
    #[case("warning: ERROR follows", Level::Warning)]
    #[case("all good", Level::Info)]
    #[case("", Level::Info)]
    fn tagged_message_levels(#[case] message: &str, #[case] expected: Level) {
        assert_eq!(Level::from_tagged_message(message), expected);
    }

    #[rstest]
    #[case("Traceback ... ERROR", Level::Error)]
    #[case("CRITICAL failure", Level::Error)]
    #[case("warn: retrying", Level::Warning)]
    #[case("debug: x=1", Level::Debug)]
    #[case("trace: span opened", Level::Debug)]
    #[case("hello", Level::Info)]
    fn raw_line_levels(#[case] line: &str, #[case] expected: Level) {
        assert_eq!(Level::from_raw_line(line), expected);
    }

    #[test]
    fn strips_matching_tag_only() {
        assert_eq!(
            strip_level_tag("[WARN] disk usage high", Level::Warning),
            "disk usage high"
        );
        assert_eq!(strip_level_tag("[ERROR]  boom ", Level::Error), "boom");
        assert_eq!(
            strip_level_tag("[INFO] mentions ERROR", Level::Error),
            "[INFO] mentions ERROR"
        );
        assert_eq!(
            strip_level_tag("plain text, no tag, mentions ERROR", Level::Error),
            "plain text, no tag, mentions ERROR"
        );
        assert_eq!(strip_level_tag("[unclosed", Level::Info), "[unclosed");
    }

    #[test]
    fn time_formatting() {
        assert_eq!(format_millis(Some(0)), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            format_millis(Some(1_704_067_200_123)),
            "2024-01-01T00:00:00.123Z"
        );
        assert!(format_millis(None).ends_with('Z'));
    }

    #[test]
    fn entry_keeps_insertion_order() {
        let mut entry = LogEntry::new("t", Level::Info, "hello");
        entry.insert("log_group", "g");
        assert_eq!(
            entry.to_json_line(),
            r#"{"_time":"t","level":"INFO","message":"hello","log_group":"g"}"#
        );
        assert!(entry.is_complete());
    }

    #[test]
    fn parse_rejects_non_objects() {
        assert!(LogEntry::parse("plain").is_none());
        assert!(LogEntry::parse("{}").is_none());
        assert!(LogEntry::parse("[1,2]").is_none());
        assert_eq!(
            LogEntry::parse(r#"{"message":"x"}"#).unwrap().get_str("message"),
            Some("x")
        );
    }

    #[rstest]
    #[case(None, "abc")]
    #[case(Some(""), "abc")]
    #[case(Some("not-found"), "abc")]
    #[case(Some("existing"), "existing")]
    fn trace_id_placeholder_rule(#[case] existing: Option<&str>, #[case] expected: &str) {
        let mut entry = LogEntry::new("t", Level::Info, "m");
        if let Some(existing) = existing {
            entry.insert(FIELD_TRACE_ID, existing);
        }
        entry.attach_trace(&TraceContext::new().with_trace_id("abc"));
        assert_eq!(entry.get_str(FIELD_TRACE_ID), Some(expected));
    }

    #[test]
    fn request_id_only_when_absent() {
        let ctx = TraceContext::new().with_request_id("req-2");

        let mut fresh = LogEntry::new("t", Level::Info, "m");
        fresh.attach_trace(&ctx);
        assert_eq!(fresh.get_str(FIELD_REQUEST_ID), Some("req-2"));
        assert!(!fresh.contains(FIELD_TRACE_ID));

        let mut existing = LogEntry::new("t", Level::Info, "m");
        existing.insert(FIELD_REQUEST_ID, "req-1");
        existing.attach_trace(&ctx);
        assert_eq!(existing.get_str(FIELD_REQUEST_ID), Some("req-1"));
    }
}
