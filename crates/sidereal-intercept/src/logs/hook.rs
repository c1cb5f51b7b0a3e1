//! Stdout hook that tees every written line to the log sink.

use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use super::sink::LogSink;
use crate::output::LineOutput;

/// Longest unterminated line held before it is shipped as is.
pub const MAX_PENDING_BYTES: usize = 64 * 1024;

/// Accumulates written bytes and yields complete lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning the complete non-blank lines they finished.
    ///
    /// An unterminated line longer than [`MAX_PENDING_BYTES`] is returned
    /// as its own line and the buffer starts over.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            push_line(&mut lines, &raw);
        }
        if self.pending.len() > MAX_PENDING_BYTES {
            let raw = std::mem::take(&mut self.pending);
            push_line(&mut lines, &raw);
        }
        lines
    }

    /// Bytes written since the last newline.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    if !line.trim().is_empty() {
        lines.push(line.to_owned());
    }
}

/// Writer adapter that passes bytes through and ships each line to the sink.
#[derive(Debug)]
pub struct LineTee<W> {
    inner: W,
    sink: Arc<LogSink>,
    splitter: LineSplitter,
}

impl<W: Write> LineTee<W> {
    pub fn new(inner: W, sink: Arc<LogSink>) -> Self {
        Self {
            inner,
            sink,
            splitter: LineSplitter::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

impl<W: Write> Write for LineTee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        for line in self.splitter.push(&buf[..written]) {
            self.sink.send_line(&line);
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Standard output with the log hook installed.
#[derive(Debug)]
pub struct HookedStdout {
    tee: Mutex<LineTee<io::Stdout>>,
}

impl HookedStdout {
    pub fn new(sink: Arc<LogSink>) -> Self {
        Self {
            tee: Mutex::new(LineTee::new(io::stdout(), sink)),
        }
    }
}

impl LineOutput for HookedStdout {
    fn write_line(&self, line: &str) {
        let mut tee = self.tee.lock();
        let _ = writeln!(tee, "{line}");
        let _ = tee.flush();
    }

    fn forwards_to_sink(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_newlines() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"partial").is_empty());
        assert_eq!(splitter.pending(), b"partial");

        let lines = splitter.push(b" line\r\nsecond\n\n   \nthird");
        assert_eq!(lines, vec!["partial line", "second"]);
        assert_eq!(splitter.pending(), b"third");
    }

    #[test]
    fn overlong_partial_line_is_flushed() {
        let mut splitter = LineSplitter::new();
        let chunk = vec![b'x'; MAX_PENDING_BYTES / 2];
        assert!(splitter.push(&chunk).is_empty());
        assert!(splitter.push(&chunk).is_empty());

        let lines = splitter.push(b"y");
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].len(), MAX_PENDING_BYTES + 1);
        assert!(splitter.pending().is_empty());

        assert_eq!(splitter.push(b"next\n"), vec!["next"]);
    }

    #[test]
    fn tee_passes_bytes_through() {
        let mut tee = LineTee::new(Vec::new(), Arc::new(LogSink::disabled()));
        write!(tee, "one\ntwo").unwrap();
        tee.flush().unwrap();
        assert_eq!(tee.get_ref().as_slice(), b"one\ntwo");
    }

    #[test]
    fn hooked_stdout_forwards() {
        let out = HookedStdout::new(Arc::new(LogSink::disabled()));
        assert!(out.forwards_to_sink());
    }
}
