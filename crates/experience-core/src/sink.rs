//! Operational message sink.
//!
//! The store reports progress and recoverable failures as `info string`
//! lines, the way the enclosing UCI layer expects. The sink is shared
//! with the loader thread, so implementations take `&self`.

use std::io::Write;
use std::sync::Mutex;

pub trait InfoSink: Send + Sync {
    fn info(&self, message: &str);
}

/// Writes `info string <message>` lines to stdout, flushing each line so
/// a GUI sees them promptly.
#[derive(Default)]
pub struct StdoutSink;

impl InfoSink for StdoutSink {
    fn info(&self, message: &str) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if writeln!(out, "info string {message}").and_then(|()| out.flush()).is_err() {
            log::warn!("failed to write info line: {message}");
        }
    }
}

/// Captures messages for inspection; used by tests.
#[derive(Default)]
pub struct BufferSink {
    lines: Mutex<Vec<String>>,
}

impl BufferSink {
    pub fn new() -> BufferSink {
        BufferSink::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("sink lock poisoned").clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl InfoSink for BufferSink {
    fn info(&self, message: &str) {
        self.lines.lock().expect("sink lock poisoned").push(message.to_string());
    }
}
