//! Line sinks receiving script output and diagnostic lines.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives one line of text at a time.
pub trait LineSink: Send + Sync {
    fn send_line(&self, line: &str);
}

impl<F> LineSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn send_line(&self, line: &str) {
        self(line)
    }
}

/// Forwards lines until closed, then drops them.
///
/// Closing takes the same lock as forwarding, so once [`GatedSink::close`]
/// returns no line can reach the inner sink anymore.
pub struct GatedSink {
    inner: Arc<dyn LineSink>,
    open: Mutex<bool>,
}

impl GatedSink {
    pub fn new(inner: Arc<dyn LineSink>) -> Self {
        Self {
            inner,
            open: Mutex::new(true),
        }
    }

    pub fn close(&self) {
        *self.open.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }

    /// Forward `line` as the very last line, then close.
    pub fn close_with(&self, line: &str) {
        let mut open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            self.inner.send_line(line);
            *open = false;
        }
    }
}

impl LineSink for GatedSink {
    fn send_line(&self, line: &str) {
        let open = self.open.lock().unwrap_or_else(PoisonError::into_inner);
        if *open {
            self.inner.send_line(line);
        }
    }
}

/// Keeps every line in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    lines: Mutex<Vec<String>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LineSink for CollectingSink {
    fn send_line(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
