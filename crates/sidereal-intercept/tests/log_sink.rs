//! Log sink delivery against a recording log store.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{unreachable_url, RecordingServer};
use sidereal_intercept::config::LogsConfig;
use sidereal_intercept::logs::entry::Level;
use sidereal_intercept::logs::LineTee;
use sidereal_intercept::{Environment, LogEntry, LogSink, ProcessTls, TraceContext};

fn sink_for(url: String) -> LogSink {
    let env = Environment {
        log_store_url: Some(url),
        function_name: Some("orders".to_owned()),
        ..Environment::default()
    };
    LogSink::new(&LogsConfig::default(), &env, Arc::new(ProcessTls::new()))
}

#[test]
fn free_text_line_is_posted_with_stream_fields() {
    let server = RecordingServer::start(204, "");
    let sink = sink_for(server.url());

    sink.send_line("ERROR payment declined");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/insert/jsonline");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.query["_stream_fields"], "container_name,job");
    assert_eq!(request.query["_msg_field"], "message");
    assert_eq!(request.query["_time_field"], "_time");
    assert_eq!(request.query["container_name"], "orders");
    assert_eq!(request.query["job"], "lambda");

    let body = request.json();
    assert_eq!(body["message"], "ERROR payment declined");
    assert_eq!(body["level"], "ERROR");
    assert_eq!(body["container_name"], "orders");
    assert_eq!(body["job"], "lambda");
    assert!(body["_time"].as_str().is_some_and(|t| t.ends_with('Z')));
}

#[test]
fn json_line_keeps_its_fields_and_gains_trace() {
    let server = RecordingServer::start(204, "");
    let sink = sink_for(server.url());

    TraceContext::new()
        .with_trace_id("Root=1-65f0-abc")
        .with_request_id("req-42")
        .sync_scope(|| {
            sink.send_line(
                r#"{"message":"charged","level":"INFO","trace_id":"not-found","job":"billing"}"#,
            );
        });

    let body = server.requests()[0].json();
    assert_eq!(body["message"], "charged");
    assert_eq!(body["trace_id"], "Root=1-65f0-abc");
    assert_eq!(body["aws_request_id"], "req-42");
    assert_eq!(body["job"], "billing");
    assert_eq!(server.requests()[0].query["job"], "billing");
}

#[test]
fn structured_entry_is_posted_once() {
    let server = RecordingServer::start(200, "ok");
    let sink = sink_for(server.url());

    let mut entry = LogEntry::new("2024-01-01T00:00:00.000Z", Level::Warning, "disk usage high");
    entry.insert("log_group", "/aws/lambda/orders");
    sink.send(entry);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].json();
    assert_eq!(body["_time"], "2024-01-01T00:00:00.000Z");
    assert_eq!(body["level"], "WARNING");
    assert_eq!(body["log_group"], "/aws/lambda/orders");
}

#[test]
fn store_errors_are_swallowed() {
    let server = RecordingServer::start(500, "boom");
    let sink = sink_for(server.url());
    sink.send_line("still fine");
    assert_eq!(server.requests().len(), 1);

    let sink = sink_for(unreachable_url());
    sink.send_line("dropped silently");
}

#[tokio::test]
async fn send_inside_async_scope_is_delivered() {
    let server = RecordingServer::start(204, "");
    let sink = sink_for(server.url());

    TraceContext::new()
        .with_trace_id("Root=1-async")
        .scope(async {
            sink.send_line("handled on a runtime thread");
        })
        .await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body = requests[0].json();
    assert_eq!(body["message"], "handled on a runtime thread");
    assert_eq!(body["trace_id"], "Root=1-async");
}

#[test]
fn teed_line_reaches_log_store_once() {
    let server = RecordingServer::start(204, "");
    let mut tee = LineTee::new(Vec::new(), Arc::new(sink_for(server.url())));

    write!(tee, "first line\npartial").unwrap();
    tee.flush().unwrap();

    assert_eq!(tee.get_ref().as_slice(), b"first line\npartial");
    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].json()["message"], "first line");
}
