use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Severity levels, lowest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const LABELS: [&'static str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

    /// Uppercase label written into each record.
    pub fn label(self) -> &'static str {
        Self::LABELS[self as usize]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Segment size cap and how many retired segments survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRotationPolicy {
    pub max_bytes: usize,
    pub max_files: usize,
}

impl Default for LogRotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 64 << 20,
            max_files: 4,
        }
    }
}

/// Serialized lines of one segment.
#[derive(Debug, Default, Clone)]
pub struct LogSegment {
    lines: Vec<String>,
    bytes: usize,
}

impl LogSegment {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    fn fits(&self, extra: usize, cap: usize) -> bool {
        self.bytes.saturating_add(extra) <= cap
    }

    fn append(&mut self, line: String) {
        self.bytes = self.bytes.saturating_add(line.len());
        self.lines.push(line);
    }
}

/// Where in the pipeline an entry originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LogScope<'a> {
    pub module: &'a str,
    pub worker: Option<usize>,
    pub event_id: Option<i64>,
}

impl<'a> LogScope<'a> {
    pub fn module(module: &'a str) -> Self {
        Self {
            module,
            worker: None,
            event_id: None,
        }
    }

    pub fn worker(self, worker: usize) -> Self {
        Self {
            worker: Some(worker),
            ..self
        }
    }

    pub fn event(self, event_id: i64) -> Self {
        Self {
            event_id: Some(event_id),
            ..self
        }
    }
}

#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    ts: u64,
    level: &'static str,
    module: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    worker: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event_id: Option<i64>,
    message: &'a str,
}

impl<'a> LogRecord<'a> {
    fn new(ts: u64, level: LogLevel, scope: LogScope<'a>, message: &'a str) -> Self {
        Self {
            ts,
            level: level.label(),
            module: scope.module,
            worker: scope.worker,
            event_id: scope.event_id,
            message,
        }
    }
}

/// In-memory JSON-line logger with a level filter and segment rotation.
#[derive(Debug, Clone)]
pub struct JsonLineLogger {
    policy: LogRotationPolicy,
    threshold: LogLevel,
    echo_stderr: bool,
    retired: VecDeque<LogSegment>,
    active: LogSegment,
}

impl JsonLineLogger {
    pub fn new(policy: LogRotationPolicy) -> Self {
        Self {
            policy,
            threshold: LogLevel::Info,
            echo_stderr: false,
            retired: VecDeque::new(),
            active: LogSegment::default(),
        }
    }

    pub fn level(&self) -> LogLevel {
        self.threshold
    }

    /// Entries below `level` are discarded from now on.
    pub fn set_level(&mut self, level: LogLevel) {
        self.threshold = level;
    }

    /// Mirrors accepted entries to stderr as they are recorded.
    pub fn set_echo_stderr(&mut self, echo: bool) {
        self.echo_stderr = echo;
    }

    /// Records one entry stamped with `ts_ms`.
    pub fn log(
        &mut self,
        ts_ms: u64,
        level: LogLevel,
        scope: LogScope<'_>,
        message: &str,
    ) -> Result<(), LoggingError> {
        if level < self.threshold {
            return Ok(());
        }
        let line = serde_json::to_string(&LogRecord::new(ts_ms, level, scope, message))?;
        if self.echo_stderr {
            eprintln!("{line}");
        }
        if !self.active.fits(line.len(), self.policy.max_bytes) {
            self.retire_active();
        }
        self.active.append(line);
        Ok(())
    }

    /// Retired segments oldest first, then the active one.
    pub fn segments(&self) -> impl Iterator<Item = &LogSegment> {
        self.retired.iter().chain(std::iter::once(&self.active))
    }

    /// Writes every retained line, oldest first.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<(), LoggingError> {
        for line in self.segments().flat_map(LogSegment::lines) {
            writeln!(out, "{line}").map_err(LoggingError::Io)?;
        }
        out.flush().map_err(LoggingError::Io)
    }

    fn retire_active(&mut self) {
        let full = std::mem::take(&mut self.active);
        if full.lines.is_empty() {
            return;
        }
        self.retired.push_back(full);
        while self.retired.len() > self.policy.max_files {
            self.retired.pop_front();
        }
    }
}

/// Logger handle shared by the run and its workers.
#[derive(Debug, Clone)]
pub struct SharedLogger {
    inner: Arc<Mutex<JsonLineLogger>>,
}

impl SharedLogger {
    pub fn new(logger: JsonLineLogger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(logger)),
        }
    }

    /// Logs with the wall-clock timestamp. A poisoned lock drops the entry.
    pub fn log(&self, level: LogLevel, scope: LogScope<'_>, message: &str) {
        if let Ok(mut logger) = self.inner.lock() {
            let _ = logger.log(unix_millis(), level, scope, message);
        }
    }

    pub fn info(&self, scope: LogScope<'_>, message: &str) {
        self.log(LogLevel::Info, scope, message);
    }

    pub fn warn(&self, scope: LogScope<'_>, message: &str) {
        self.log(LogLevel::Warn, scope, message);
    }

    pub fn error(&self, scope: LogScope<'_>, message: &str) {
        self.log(LogLevel::Error, scope, message);
    }

    /// Runs `f` against the underlying logger.
    pub fn with<R>(&self, f: impl FnOnce(&JsonLineLogger) -> R) -> Result<R, LoggingError> {
        let logger = self.inner.lock().map_err(|_| LoggingError::Poisoned)?;
        Ok(f(&logger))
    }
}

impl Default for SharedLogger {
    fn default() -> Self {
        Self::new(JsonLineLogger::new(LogRotationPolicy::default()))
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("log record not serializable: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("log write failed: {0}")]
    Io(std::io::Error),
    #[error("logger lock poisoned")]
    Poisoned,
}
