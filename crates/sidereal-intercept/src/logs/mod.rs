//! Log service substitution: record synthesis, stdout hook and log store shipping.

pub mod entry;
pub mod hook;
pub mod mock;
pub mod sink;

pub use entry::{Level, LogEntry};
pub use hook::{HookedStdout, LineSplitter, LineTee};
pub use mock::{LogBatch, LogRecord, LogsMock, LogsOperation};
pub use sink::LogSink;
