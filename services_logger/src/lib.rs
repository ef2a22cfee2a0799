//! # Logger Service
//!
//! This crate implements the per-process logger handed to every process
//! context.
//!
//! ## Philosophy
//!
//! Logging is explicit and structured, not text-based or printf-style.
//! Messages can be deferred: a closure passed as a message is only invoked
//! when the level passes the logger's threshold, so suppressed debug output
//! costs nothing to build.
//!
//! Entries are kept in a bounded [`LogBuffer`] (for inspection by the host
//! and by tests) and forwarded to the `log` facade under the
//! `wombat::process` target.

use core_types::Pid;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Target used when forwarding entries to the `log` facade
pub const LOG_TARGET: &str = "wombat::process";

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational messages
    Info,
    /// Warnings
    Warn,
    /// Errors
    Error,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// A message that is either ready or built on demand
pub enum LogMessage<'a> {
    /// A message that already exists
    Literal(Cow<'a, str>),
    /// A message built only if it will be emitted
    Deferred(Box<dyn FnOnce() -> String + 'a>),
}

impl<'a> LogMessage<'a> {
    /// Wraps a closure so it runs only when the message is emitted
    pub fn lazy<F>(build: F) -> Self
    where
        F: FnOnce() -> String + 'a,
    {
        LogMessage::Deferred(Box::new(build))
    }

    fn render(self) -> String {
        match self {
            LogMessage::Literal(text) => text.into_owned(),
            LogMessage::Deferred(build) => build(),
        }
    }
}

impl<'a> From<&'a str> for LogMessage<'a> {
    fn from(text: &'a str) -> Self {
        LogMessage::Literal(Cow::Borrowed(text))
    }
}

impl From<String> for LogMessage<'_> {
    fn from(text: String) -> Self {
        LogMessage::Literal(Cow::Owned(text))
    }
}

/// A structured log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Log level
    pub level: LogLevel,
    /// Source process (if known)
    pub source: Option<Pid>,
    /// Log message
    pub message: String,
    /// Structured fields
    pub fields: Vec<(String, String)>,
}

impl LogEntry {
    /// Creates a new log entry
    pub fn new(level: LogLevel, message: String) -> Self {
        Self {
            level,
            source: None,
            message,
            fields: Vec::new(),
        }
    }

    /// Sets the source process
    pub fn with_source(mut self, source: Pid) -> Self {
        self.source = Some(source);
        self
    }

    /// Adds a field to the log entry
    pub fn with_field(mut self, key: String, value: String) -> Self {
        self.fields.push((key, value));
        self
    }

    /// Looks up a field by key
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Bounded ring of recent log entries
///
/// When full, the oldest entry is dropped to make room.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    capacity: usize,
    entries: VecDeque<LogEntry>,
    dropped: u64,
}

impl LogBuffer {
    /// Creates a buffer holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Wraps a new buffer for sharing between loggers
    pub fn shared(capacity: usize) -> SharedLogBuffer {
        Rc::new(RefCell::new(Self::with_capacity(capacity)))
    }

    /// Appends an entry, evicting the oldest one if needed
    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            self.dropped += 1;
            return;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    /// Returns buffered entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Removes and returns all buffered entries
    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    /// Number of entries currently buffered
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries evicted since creation
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Log buffer shared by every logger of one kernel
pub type SharedLogBuffer = Rc<RefCell<LogBuffer>>;

/// Logger handed to a process (or to host code through [`LoggerFactory`])
#[derive(Debug, Clone)]
pub struct ProcessLogger {
    name: String,
    source: Option<Pid>,
    threshold: LogLevel,
    buffer: Option<SharedLogBuffer>,
}

impl ProcessLogger {
    /// Creates a logger that emits `threshold` and above
    pub fn new(name: impl Into<String>, threshold: LogLevel) -> Self {
        Self {
            name: name.into(),
            source: None,
            threshold,
            buffer: None,
        }
    }

    /// Tags every entry with the emitting process
    pub fn with_source(mut self, pid: Pid) -> Self {
        self.source = Some(pid);
        self
    }

    /// Records entries into a shared buffer in addition to the facade
    pub fn with_buffer(mut self, buffer: SharedLogBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Logger name (image name for process loggers)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks whether a message at `level` would be emitted
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.threshold
    }

    /// Emits a message at `level`
    pub fn log<'m>(&self, level: LogLevel, message: impl Into<LogMessage<'m>>) {
        if !self.enabled(level) {
            return;
        }
        let text = message.into().render();
        let facade_level: log::Level = level.into();

        match self.source {
            Some(pid) => log::log!(
                target: LOG_TARGET,
                facade_level,
                "[{} {}] {}",
                self.name,
                pid,
                text
            ),
            None => log::log!(target: LOG_TARGET, facade_level, "[{}] {}", self.name, text),
        }

        if let Some(buffer) = &self.buffer {
            let mut entry =
                LogEntry::new(level, text).with_field("logger".to_string(), self.name.clone());
            if let Some(pid) = self.source {
                entry = entry.with_source(pid);
            }
            buffer.borrow_mut().push(entry);
        }
    }

    pub fn debug<'m>(&self, message: impl Into<LogMessage<'m>>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info<'m>(&self, message: impl Into<LogMessage<'m>>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn<'m>(&self, message: impl Into<LogMessage<'m>>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error<'m>(&self, message: impl Into<LogMessage<'m>>) {
        self.log(LogLevel::Error, message);
    }
}

/// Hands out named loggers that share one threshold and buffer
#[derive(Debug, Clone)]
pub struct LoggerFactory {
    threshold: LogLevel,
    buffer: SharedLogBuffer,
}

impl LoggerFactory {
    /// Creates a factory
    pub fn new(threshold: LogLevel, buffer: SharedLogBuffer) -> Self {
        Self { threshold, buffer }
    }

    /// Returns a logger with the given name
    pub fn logger(&self, name: &str) -> ProcessLogger {
        ProcessLogger::new(name, self.threshold).with_buffer(self.buffer.clone())
    }

    /// Returns a logger tagged with a process
    pub fn process_logger(&self, name: &str, pid: Pid) -> ProcessLogger {
        self.logger(name).with_source(pid)
    }

    /// The buffer shared by this factory's loggers
    pub fn buffer(&self) -> &SharedLogBuffer {
        &self.buffer
    }
}
