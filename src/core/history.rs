//! Rolling buffer of recent log lines
//!
//! Keeps the tail of the local log so high-severity telemetry events can
//! carry the lines that led up to them. The buffer is written through a tee
//! wrapped around the logger's output sink and cleared after being attached
//! to an event, so the same lines are not resent with the next one.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

/// Fixed-depth rolling window over the most recent raw log lines
#[derive(Debug)]
pub struct LogHistoryBuffer {
    depth: usize,
    lines: Mutex<VecDeque<String>>,
}

impl LogHistoryBuffer {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            lines: Mutex::new(VecDeque::with_capacity(depth)),
        }
    }

    /// Append one complete log line, evicting the oldest when full
    pub fn append_line(&self, line: &str) {
        let mut lines = self.lines.lock();
        if lines.len() >= self.depth {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    /// Concatenated snapshot of the buffered lines, without clearing
    pub fn snapshot(&self) -> String {
        let lines = self.lines.lock();
        let mut out = String::new();
        for line in lines.iter() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Clear the buffer
    pub fn trim(&self) {
        self.lines.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    /// Wrap a log output sink so every line written through it is also
    /// recorded in this buffer (write-through tee).
    pub fn wrap_output<W: Write>(self: &Arc<Self>, sink: W) -> HistoryWriter<W> {
        HistoryWriter {
            sink,
            history: Arc::clone(self),
            partial: String::new(),
        }
    }
}

/// Write-through tee over a log sink, feeding a [`LogHistoryBuffer`]
pub struct HistoryWriter<W> {
    sink: W,
    history: Arc<LogHistoryBuffer>,
    partial: String,
}

impl<W: Write> HistoryWriter<W> {
    fn record(&mut self, chunk: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(chunk));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            self.history.append_line(line.trim_end_matches('\n'));
        }
    }
}

impl<W: Write> Write for HistoryWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.sink.write(buf)?;
        self.record(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
