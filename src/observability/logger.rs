//! Structured JSON logger handles
//!
//! - One log line = one event
//! - Deterministic key ordering (event, severity, component, then fields sorted)
//! - Explicit severity levels
//! - Synchronous, no buffering
//!
//! There is no process-wide logger. Every backend, helper and content object
//! receives a [`Logger`] at construction and logs through it.

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use super::events::Event;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Debug-level detail
    Trace = 0,
    /// Normal operations
    Info = 1,
    /// Recoverable issues
    Warn = 2,
    /// Operation failures
    Error = 3,
    /// Unrecoverable, the owning component is unusable
    Fatal = 4,
}

impl Severity {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Destination for rendered log lines.
pub trait LogSink: Send + Sync {
    /// Write one complete line (including the trailing newline).
    fn write_line(&self, severity: Severity, line: &str);
}

/// Writes INFO and below to stdout, ERROR and FATAL to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl LogSink for StdioSink {
    fn write_line(&self, severity: Severity, line: &str) {
        // Write atomically (one syscall)
        if severity >= Severity::Error {
            let mut err = io::stderr();
            let _ = err.write_all(line.as_bytes());
            let _ = err.flush();
        } else {
            let mut out = io::stdout();
            let _ = out.write_all(line.as_bytes());
            let _ = out.flush();
        }
    }
}

/// Drops every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl LogSink for DiscardSink {
    fn write_line(&self, _severity: Severity, _line: &str) {}
}

/// Keeps every line in memory. Used by tests to assert on emitted events.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of captured lines, without trailing newlines
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().map(|l| l.trim_end().to_string()).collect(),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .map(|l| l.trim_end().to_string())
                .collect(),
        }
    }

    /// True if any captured line carries the given event name
    pub fn contains_event(&self, event: Event) -> bool {
        let needle = format!("\"event\":\"{}\"", event.as_str());
        self.lines().iter().any(|l| l.contains(&needle))
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, _severity: Severity, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_string()),
            Err(poisoned) => poisoned.into_inner().push(line.to_string()),
        }
    }
}

/// A cloneable structured logging handle.
///
/// Cloning is cheap; clones share the sink. [`Logger::child`] derives a
/// handle for a sub-component that keeps the same sink and threshold.
#[derive(Clone)]
pub struct Logger {
    component: Arc<str>,
    sink: Arc<dyn LogSink>,
    min_severity: Severity,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("component", &self.component)
            .field("min_severity", &self.min_severity)
            .finish()
    }
}

impl Logger {
    /// Create a handle writing to the given sink
    pub fn new(component: &str, sink: Arc<dyn LogSink>, min_severity: Severity) -> Self {
        Self {
            component: Arc::from(component),
            sink,
            min_severity,
        }
    }

    /// Handle writing to stdout/stderr at INFO and above
    pub fn stdio(component: &str) -> Self {
        Self::new(component, Arc::new(StdioSink), Severity::Info)
    }

    /// Handle that drops everything
    pub fn discard() -> Self {
        Self::new("discard", Arc::new(DiscardSink), Severity::Fatal)
    }

    /// Handle capturing every severity into a shared [`MemorySink`]
    pub fn capture(component: &str) -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = Self::new(component, sink.clone(), Severity::Trace);
        (logger, sink)
    }

    /// Derive a handle for a sub-component sharing sink and threshold
    pub fn child(&self, component: &str) -> Self {
        Self {
            component: Arc::from(format!("{}.{}", self.component, component)),
            sink: Arc::clone(&self.sink),
            min_severity: self.min_severity,
        }
    }

    /// Same handle with a different threshold
    pub fn with_min_severity(mut self, min_severity: Severity) -> Self {
        self.min_severity = min_severity;
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity >= self.min_severity
    }

    /// Log an event with the given severity and fields
    pub fn log(&self, severity: Severity, event: Event, fields: &[(&str, &str)]) {
        if !self.enabled(severity) {
            return;
        }
        let line = render_line(severity, event.as_str(), &self.component, fields);
        self.sink.write_line(severity, &line);
    }

    pub fn trace(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Trace, event, fields);
    }

    pub fn info(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Info, event, fields);
    }

    pub fn warn(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Warn, event, fields);
    }

    pub fn error(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Error, event, fields);
    }

    pub fn fatal(&self, event: Event, fields: &[(&str, &str)]) {
        self.log(Severity::Fatal, event, fields);
    }
}

/// Render one JSON line. Fields are output sorted by key.
fn render_line(severity: Severity, event: &str, component: &str, fields: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(256);

    output.push('{');

    output.push_str("\"event\":\"");
    escape_json_string(&mut output, event);
    output.push('"');

    output.push_str(",\"severity\":\"");
    output.push_str(severity.as_str());
    output.push('"');

    output.push_str(",\"component\":\"");
    escape_json_string(&mut output, component);
    output.push('"');

    let mut sorted_fields: Vec<_> = fields.iter().collect();
    sorted_fields.sort_by_key(|(k, _)| *k);

    for (key, value) in sorted_fields {
        output.push_str(",\"");
        escape_json_string(&mut output, key);
        output.push_str("\":\"");
        escape_json_string(&mut output, value);
        output.push('"');
    }

    output.push('}');
    output.push('\n');
    output
}

fn escape_json_string(output: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => output.push_str("\\\""),
            '\\' => output.push_str("\\\\"),
            '\n' => output.push_str("\\n"),
            '\r' => output.push_str("\\r"),
            '\t' => output.push_str("\\t"),
            c if c.is_control() => {
                output.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => output.push(c),
        }
    }
}
