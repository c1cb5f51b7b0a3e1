//! Local answers for log service operations.
//!
//! Batch writes become structured records on the configured output (and the
//! log sink). Administrative and describe operations get an empty success
//! response of the right shape.

use std::fmt;
use std::sync::Arc;

use super::entry::{format_millis, strip_level_tag, Level, LogEntry, FIELD_CONTAINER, FIELD_JOB};
use super::sink::LogSink;
use crate::call::{MethodSignature, Reply};
use crate::config::{Environment, LogsConfig};
use crate::context::TraceContext;
use crate::output::LineOutput;
use crate::reflect::{Member, SdkObject};

/// Type name prefix shared by log service requests and responses.
pub const MODEL_PREFIX: &str = "cloudwatchlogs::model::";

/// Sequence token returned by every local batch write.
pub const MOCK_SEQUENCE_TOKEN: &str = "mock-token";

const UNKNOWN: &str = "unknown";

/// Log service operations answered locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogsOperation {
    PutLogEvents,
    CreateLogGroup,
    CreateLogStream,
    DeleteLogGroup,
    DeleteLogStream,
    DescribeLogGroups,
    DescribeLogStreams,
}

impl LogsOperation {
    pub const ALL: [Self; 7] = [
        Self::PutLogEvents,
        Self::CreateLogGroup,
        Self::CreateLogStream,
        Self::DeleteLogGroup,
        Self::DeleteLogStream,
        Self::DescribeLogGroups,
        Self::DescribeLogStreams,
    ];

    /// Resolve an operation name, in either `camelCase` or `snake_case`.
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted: String = name
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().to_ascii_lowercase() == wanted)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PutLogEvents => "putLogEvents",
            Self::CreateLogGroup => "createLogGroup",
            Self::CreateLogStream => "createLogStream",
            Self::DeleteLogGroup => "deleteLogGroup",
            Self::DeleteLogStream => "deleteLogStream",
            Self::DescribeLogGroups => "describeLogGroups",
            Self::DescribeLogStreams => "describeLogStreams",
        }
    }

    /// Whether this operation may be called through a builder-consumer callback.
    pub const fn allows_consumer(self) -> bool {
        !matches!(self, Self::PutLogEvents)
    }

    /// Type name of the operation's request.
    pub fn request_type(self) -> String {
        format!("{MODEL_PREFIX}{}Request", self.pascal_name())
    }

    /// Type name of the operation's response.
    pub fn response_type(self) -> String {
        format!("{MODEL_PREFIX}{}Response", self.pascal_name())
    }

    fn pascal_name(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        chars.next().map_or_else(String::new, |first| {
            first.to_ascii_uppercase().to_string() + chars.as_str()
        })
    }
}

impl fmt::Display for LogsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event of a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub timestamp_millis: Option<i64>,
}

/// The parts of a batch write request the mock needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub group: String,
    pub stream: String,
    pub records: Vec<LogRecord>,
}

impl LogBatch {
    /// Read a batch from a request. Missing fields read as `"unknown"` or empty.
    pub fn from_request(request: &SdkObject) -> Self {
        let records = request
            .list("logEvents")
            .iter()
            .filter_map(Member::as_object)
            .map(|event| LogRecord {
                message: event.string("message").unwrap_or_default(),
                timestamp_millis: event.long("timestamp"),
            })
            .collect();

        Self {
            group: request
                .string("logGroupName")
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            stream: request
                .string("logStreamName")
                .unwrap_or_else(|| UNKNOWN.to_owned()),
            records,
        }
    }
}

/// Synthesises log service responses.
pub struct LogsMock {
    sink: Arc<LogSink>,
    output: Arc<dyn LineOutput>,
    logger: String,
    container_name: String,
    job: String,
}

impl fmt::Debug for LogsMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogsMock")
            .field("logger", &self.logger)
            .field("container_name", &self.container_name)
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}

impl LogsMock {
    pub fn new(
        config: &LogsConfig,
        env: &Environment,
        sink: Arc<LogSink>,
        output: Arc<dyn LineOutput>,
    ) -> Self {
        Self {
            sink,
            output,
            logger: config.logger.clone(),
            container_name: env.container_name(&config.default_container).to_owned(),
            job: config.job.clone(),
        }
    }

    /// Answer an operation locally. `None` means "not handled".
    pub fn handle(
        &self,
        signature: &MethodSignature,
        request: Option<&SdkObject>,
    ) -> Option<Reply<SdkObject>> {
        let operation = LogsOperation::from_name(&signature.name)?;
        let response = match operation {
            LogsOperation::PutLogEvents => {
                let batch = LogBatch::from_request(request?);
                self.emit_batch(&batch);
                SdkObject::builder(operation.response_type())
                    .set("nextSequenceToken", MOCK_SEQUENCE_TOKEN)
                    .build()
            }
            LogsOperation::CreateLogGroup
            | LogsOperation::CreateLogStream
            | LogsOperation::DeleteLogGroup
            | LogsOperation::DeleteLogStream => SdkObject::new(operation.response_type()),
            LogsOperation::DescribeLogGroups => SdkObject::builder(operation.response_type())
                .set("logGroups", Vec::<Member>::new())
                .build(),
            LogsOperation::DescribeLogStreams => SdkObject::builder(operation.response_type())
                .set("logStreams", Vec::<Member>::new())
                .build(),
        };

        tracing::debug!(logs.operation = %operation, "Answered log service call locally");
        Some(Reply::for_kind(signature.returns, response))
    }

    /// Build the record for one event of `batch`.
    pub fn entry_for(&self, batch: &LogBatch, record: &LogRecord, ctx: &TraceContext) -> LogEntry {
        let level = Level::from_tagged_message(&record.message);
        let message = strip_level_tag(&record.message, level);

        let mut entry = LogEntry::new(format_millis(record.timestamp_millis), level, message);
        entry.insert("log_group", batch.group.as_str());
        entry.insert("log_stream", batch.stream.as_str());
        entry.insert("logger", self.logger.as_str());
        entry.insert(FIELD_CONTAINER, self.container_name.as_str());
        entry.insert(FIELD_JOB, self.job.as_str());
        entry.attach_trace(ctx);
        entry
    }

    fn emit_batch(&self, batch: &LogBatch) {
        let ctx = TraceContext::current().unwrap_or_default();
        let forward = !self.output.forwards_to_sink();

        for record in &batch.records {
            let entry = self.entry_for(batch, record, &ctx);
            self.output.write_line(&entry.to_json_line());
            if forward {
                self.sink.send(entry);
            }
        }
    }
}
