//! Line-oriented destinations for emitted records.

use std::io::Write;

use parking_lot::Mutex;

/// Destination for single-line records.
pub trait LineOutput: Send + Sync {
    /// Write one line. Failures are ignored.
    fn write_line(&self, line: &str);

    /// Whether lines written here already reach the log sink.
    fn forwards_to_sink(&self) -> bool {
        false
    }
}

/// Process standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct Stdout;

impl LineOutput for Stdout {
    fn write_line(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{line}");
    }
}

/// Collects lines in memory.
#[derive(Debug, Default)]
pub struct BufferedOutput {
    lines: Mutex<Vec<String>>,
    forwards: bool,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that reports itself as already forwarding to the sink.
    pub fn forwarding() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            forwards: true,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }
}

impl LineOutput for BufferedOutput {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_owned());
    }

    fn forwards_to_sink(&self) -> bool {
        self.forwards
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_output_collects() {
        let out = BufferedOutput::new();
        out.write_line("one");
        out.write_line("two");
        assert_eq!(out.lines(), vec!["one", "two"]);
        assert_eq!(out.take().len(), 2);
        assert!(out.lines().is_empty());
        assert!(!out.forwards_to_sink());
        assert!(BufferedOutput::forwarding().forwards_to_sink());
    }

    #[test]
    fn stdout_does_not_forward() {
        assert!(!Stdout.forwards_to_sink());
    }
}
