//! Best-effort shipping of log entries to the remote log store.
//!
//! Entries are POSTed one JSON object per request to the store's ingestion
//! path, with stream fields passed as query parameters. Every failure is
//! swallowed: a dropped log line must never surface in the caller.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use url::Url;

use super::entry::{
    format_time, Level, LogEntry, FIELD_CONTAINER, FIELD_JOB, FIELD_LEVEL, FIELD_MESSAGE,
    FIELD_TIME,
};
use crate::config::{Environment, LogsConfig};
use crate::context::TraceContext;
use crate::error::{InterceptError, InterceptResult};
use crate::tls::{run_off_runtime, HttpClients, ProcessTls};

/// Epoch values at or above this are milliseconds, below it seconds.
const MILLIS_THRESHOLD: f64 = 1e12;

/// Ships log entries to the remote log store.
#[derive(Debug)]
pub struct LogSink {
    endpoint: Option<Url>,
    container_name: String,
    job: String,
    clients: HttpClients,
}

impl LogSink {
    /// Create a sink. It is disabled when no log store URL is configured or
    /// the URL cannot be parsed.
    pub fn new(config: &LogsConfig, env: &Environment, tls: Arc<ProcessTls>) -> Self {
        let endpoint = env
            .log_store_url
            .as_deref()
            .and_then(|base| match ingest_url(base, &config.ingest_path) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Log store URL rejected, log shipping disabled");
                    None
                }
            });

        Self {
            endpoint,
            container_name: env.container_name(&config.default_container).to_owned(),
            job: config.job.clone(),
            clients: HttpClients::new(tls, config.connect_timeout(), config.read_timeout()),
        }
    }

    /// A sink that never sends.
    pub fn disabled() -> Self {
        Self::new(
            &LogsConfig::default(),
            &Environment::default(),
            Arc::new(ProcessTls::new()),
        )
    }

    pub const fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Ingestion URL, without query parameters.
    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    /// Ship a line of free text or JSON.
    pub fn send_line(&self, text: &str) {
        if !self.is_enabled() {
            return;
        }
        self.send(Self::entry_from_line(text));
    }

    /// Ship a structured entry.
    pub fn send(&self, mut entry: LogEntry) {
        if !self.is_enabled() {
            return;
        }
        let ctx = TraceContext::current().unwrap_or_default();
        self.enrich(&mut entry, &ctx);

        if let Err(e) = run_off_runtime(|| self.deliver(&entry)) {
            tracing::debug!(error = %e, error.type = e.error_type(), "Log entry dropped");
        }
    }

    /// Turn a raw output line into an entry with the required fields.
    pub fn entry_from_line(text: &str) -> LogEntry {
        let mut entry = LogEntry::parse(text).unwrap_or_else(|| {
            let mut minimal = LogEntry::default();
            minimal.insert(FIELD_MESSAGE, text);
            minimal.insert(FIELD_LEVEL, Level::from_raw_line(text).as_str());
            minimal
        });

        if !entry.contains(FIELD_TIME) {
            let time = entry
                .get("timestamp")
                .and_then(timestamp_to_time)
                .unwrap_or_else(|| format_time(Utc::now()));
            entry.insert(FIELD_TIME, time);
        }
        entry.insert_if_absent(FIELD_MESSAGE, text);
        if !entry.contains(FIELD_LEVEL) {
            entry.insert(FIELD_LEVEL, Level::from_raw_line(text).as_str());
        }
        entry
    }

    /// Add stream metadata and trace ids.
    pub fn enrich(&self, entry: &mut LogEntry, ctx: &TraceContext) {
        entry.insert_if_absent(FIELD_CONTAINER, self.container_name.as_str());
        entry.insert_if_absent(FIELD_JOB, self.job.as_str());
        entry.attach_trace(ctx);
    }

    fn deliver(&self, entry: &LogEntry) -> InterceptResult<()> {
        let Some(endpoint) = &self.endpoint else {
            return Ok(());
        };
        let client = self.clients.client()?;

        let container = entry.get_str(FIELD_CONTAINER).unwrap_or(&self.container_name);
        let job = entry.get_str(FIELD_JOB).unwrap_or(&self.job);
        let stream_fields = format!("{FIELD_CONTAINER},{FIELD_JOB}");

        let response = client
            .post(endpoint.clone())
            .query(&[
                ("_stream_fields", stream_fields.as_str()),
                ("_msg_field", FIELD_MESSAGE),
                ("_time_field", FIELD_TIME),
                (FIELD_CONTAINER, container),
                (FIELD_JOB, job),
            ])
            .header(CONTENT_TYPE, "application/json")
            .body(entry.to_json_line())
            .send()?;

        let status = response.status();
        // Drain so the connection can be reused.
        let _ = response.bytes();
        if !status.is_success() {
            tracing::debug!(http.status_code = status.as_u16(), "Log store rejected entry");
        }
        Ok(())
    }
}

fn ingest_url(base: &str, path: &str) -> InterceptResult<Url> {
    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| InterceptError::invalid_endpoint(base, e))
}

fn timestamp_to_time(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => {
            let raw = n.as_f64()?;
            #[allow(clippy::cast_possible_truncation)]
            let millis = if raw >= MILLIS_THRESHOLD {
                raw as i64
            } else {
                (raw * 1000.0) as i64
            };
            Utc.timestamp_millis_opt(millis).single().map(format_time)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(log_store: Option<&str>, function: Option<&str>) -> Environment {
        Environment {
            log_store_url: log_store.map(str::to_owned),
            function_name: function.map(str::to_owned),
            ..Environment::default()
        }
    }

    fn sink(log_store: Option<&str>, function: Option<&str>) -> LogSink {
        LogSink::new(
            &LogsConfig::default(),
            &env(log_store, function),
            Arc::new(ProcessTls::new()),
        )
    }

    #[test]
    fn disabled_without_url() {
        let sink = sink(None, None);
        assert!(!sink.is_enabled());
        // Must be a silent no-op.
        sink.send_line("hello");
        assert!(!LogSink::disabled().is_enabled());
    }

    #[test]
    fn endpoint_joins_ingest_path() {
        let sink = sink(Some("http://victorialogs:9428/"), None);
        assert_eq!(
            sink.endpoint().map(Url::as_str),
            Some("http://victorialogs:9428/insert/jsonline")
        );
    }

    #[test]
    fn unparseable_url_disables() {
        assert!(!sink(Some("not a url"), None).is_enabled());
    }

    #[test]
    fn plain_line_gets_minimal_entry() {
        let entry = LogSink::entry_from_line("WARN low memory");
        assert_eq!(entry.get_str("message"), Some("WARN low memory"));
        assert_eq!(entry.get_str("level"), Some("WARNING"));
        assert!(entry.is_complete());
    }

    #[test]
    fn json_line_is_backfilled() {
        let entry = LogSink::entry_from_line(r#"{"msg":"x","timestamp":"2024-05-01T10:00:00Z"}"#);
        assert_eq!(entry.get_str("_time"), Some("2024-05-01T10:00:00Z"));
        assert_eq!(
            entry.get_str("message"),
            Some(r#"{"msg":"x","timestamp":"2024-05-01T10:00:00Z"}"#)
        );
        assert_eq!(entry.get_str("level"), Some("INFO"));
        assert_eq!(entry.get_str("msg"), Some("x"));
    }

    #[test]
    fn numeric_timestamps() {
        let millis = LogSink::entry_from_line(r#"{"message":"m","timestamp":1704067200123}"#);
        assert_eq!(millis.get_str("_time"), Some("2024-01-01T00:00:00.123Z"));

        let seconds = LogSink::entry_from_line(r#"{"message":"m","timestamp":1704067200.5}"#);
        assert_eq!(seconds.get_str("_time"), Some("2024-01-01T00:00:00.500Z"));
    }

    #[test]
    fn existing_fields_are_kept() {
        let entry =
            LogSink::entry_from_line(r#"{"_time":"t","level":"ERROR","message":"boom"}"#);
        assert_eq!(entry.get_str("_time"), Some("t"));
        assert_eq!(entry.get_str("level"), Some("ERROR"));
        assert_eq!(entry.get_str("message"), Some("boom"));
    }

    #[test]
    fn enrich_defaults_and_trace() {
        let sink = sink(Some("http://logs:9428"), Some("orders"));
        let mut entry = LogEntry::new("t", Level::Info, "m");
        entry.insert("trace_id", "not-found");

        let ctx = TraceContext::new()
            .with_trace_id("Root=1-abc")
            .with_request_id("req-9");
        sink.enrich(&mut entry, &ctx);

        assert_eq!(entry.get_str("container_name"), Some("orders"));
        assert_eq!(entry.get_str("job"), Some("lambda"));
        assert_eq!(entry.get_str("trace_id"), Some("Root=1-abc"));
        assert_eq!(entry.get_str("aws_request_id"), Some("req-9"));
    }

    #[test]
    fn enrich_unknown_function() {
        let sink = sink(Some("http://logs:9428"), None);
        let mut entry = LogEntry::new("t", Level::Info, "m");
        entry.insert("job", "custom");
        sink.enrich(&mut entry, &TraceContext::new());

        assert_eq!(entry.get_str("container_name"), Some("lambda-unknown"));
        assert_eq!(entry.get_str("job"), Some("custom"));
        assert!(!entry.contains("trace_id"));
    }
}
