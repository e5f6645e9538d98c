//! `mirrorkit_log` v1:
//! Explicit leveled logger handle for the sync engine.
//!
//! A [`Logger`] is built once by the caller and handed to every component that
//! needs diagnostics. Records pass a level gate (`Verbose < Info < Warn <
//! Error`, plus an independent debug switch) and then go to a [`LogSink`].
//! The default sink forwards into `tracing`.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;

/// Environment variable holding the `tracing` filter directive for [`init_tracing`].
pub const C_ENV_LOG_FILTER: &str = "MIRRORKIT_LOG";

////////////////////////////////////////////////////////////////////////////////
// #region Levels

/// Minimum severity accepted by a [`Logger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumLogLevel {
    Verbose,
    Info,
    Warn,
    Error,
}

/// Channel of one emitted record.
///
/// `Debug` is not part of the severity ladder; it is gated by the debug switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumLogRecordKind {
    Verbose,
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for EnumLogRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c_name = match self {
            Self::Verbose => "VERBOSE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        };
        f.write_str(c_name)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Sinks

/// Destination of accepted records.
///
/// Implementations must be callable from any thread.
pub trait LogSink: Send + Sync {
    fn write(&self, kind: EnumLogRecordKind, message: &str);
}

/// Forwards records into the `tracing` macros under target `mirrorkit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn write(&self, kind: EnumLogRecordKind, message: &str) {
        match kind {
            EnumLogRecordKind::Verbose => tracing::trace!(target: "mirrorkit", "{message}"),
            EnumLogRecordKind::Debug => tracing::debug!(target: "mirrorkit", "{message}"),
            EnumLogRecordKind::Info => tracing::info!(target: "mirrorkit", "{message}"),
            EnumLogRecordKind::Warn => tracing::warn!(target: "mirrorkit", "{message}"),
            EnumLogRecordKind::Error => tracing::error!(target: "mirrorkit", "{message}"),
        }
    }
}

/// One record captured by [`MemoryLogSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecLogRecord {
    pub kind: EnumLogRecordKind,
    pub message: String,
}

/// In-memory sink, used to inspect what a component logged.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    l_records: Mutex<Vec<SpecLogRecord>>,
}

impl MemoryLogSink {
    /// Snapshot of all records captured so far.
    pub fn records(&self) -> Vec<SpecLogRecord> {
        self.l_records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Messages captured on one channel, in emission order.
    pub fn messages(&self, kind: EnumLogRecordKind) -> Vec<String> {
        self.records()
            .into_iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.message)
            .collect()
    }

    /// Whether any record on `kind` contains `needle`.
    pub fn contains(&self, kind: EnumLogRecordKind, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|r| r.kind == kind && r.message.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn write(&self, kind: EnumLogRecordKind, message: &str) {
        self.l_records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(SpecLogRecord {
                kind,
                message: message.to_string(),
            });
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Logger

/// Cheap-to-clone leveled logger handle.
#[derive(Clone)]
pub struct Logger {
    level: EnumLogLevel,
    if_debug: bool,
    sink: Arc<dyn LogSink>,
}

impl Logger {
    /// Logger writing to [`TracingLogSink`].
    pub fn new(level: EnumLogLevel) -> Self {
        Self::with_sink(level, Arc::new(TracingLogSink))
    }

    /// Logger writing to a caller-provided sink.
    pub fn with_sink(level: EnumLogLevel, sink: Arc<dyn LogSink>) -> Self {
        Self {
            level,
            if_debug: false,
            sink,
        }
    }

    /// Enable or disable the debug channel.
    pub fn with_debug(mut self, if_debug: bool) -> Self {
        self.if_debug = if_debug;
        self
    }

    pub fn level(&self) -> EnumLogLevel {
        self.level
    }

    pub fn if_debug(&self) -> bool {
        self.if_debug
    }

    /// Whether a record on `kind` would reach the sink.
    pub fn is_enabled(&self, kind: EnumLogRecordKind) -> bool {
        match kind {
            EnumLogRecordKind::Debug => self.if_debug,
            EnumLogRecordKind::Verbose => self.level <= EnumLogLevel::Verbose,
            EnumLogRecordKind::Info => self.level <= EnumLogLevel::Info,
            EnumLogRecordKind::Warn => self.level <= EnumLogLevel::Warn,
            EnumLogRecordKind::Error => self.level <= EnumLogLevel::Error,
        }
    }

    pub fn log(&self, kind: EnumLogRecordKind, message: impl AsRef<str>) {
        if self.is_enabled(kind) {
            self.sink.write(kind, message.as_ref());
        }
    }

    pub fn verbose(&self, message: impl AsRef<str>) {
        self.log(EnumLogRecordKind::Verbose, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(EnumLogRecordKind::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(EnumLogRecordKind::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(EnumLogRecordKind::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(EnumLogRecordKind::Error, message);
    }
}

impl Default for Logger {
    /// `Warn` level, debug off, forwarding to `tracing`.
    fn default() -> Self {
        Self::new(EnumLogLevel::Warn)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level)
            .field("if_debug", &self.if_debug)
            .finish_non_exhaustive()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Subscriber

/// Install a stderr `tracing` subscriber for binaries and tests.
///
/// The filter comes from `MIRRORKIT_LOG` when set, else `default_directive`.
/// Returns `false` when a global subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> bool {
    let filter = EnvFilter::try_from_env(C_ENV_LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{EnumLogLevel, EnumLogRecordKind, Logger, MemoryLogSink, init_tracing};

    fn build_logger(level: EnumLogLevel) -> (Logger, Arc<MemoryLogSink>) {
        let sink = Arc::new(MemoryLogSink::default());
        (Logger::with_sink(level, sink.clone()), sink)
    }

    #[test]
    fn logger_level_gates_lower_severities() {
        let (logger, sink) = build_logger(EnumLogLevel::Warn);
        logger.verbose("v");
        logger.info("i");
        logger.warn("w");
        logger.error("e");

        let l_kinds = sink
            .records()
            .into_iter()
            .map(|r| r.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            l_kinds,
            vec![EnumLogRecordKind::Warn, EnumLogRecordKind::Error]
        );
    }

    #[test]
    fn logger_verbose_level_accepts_everything_but_debug() {
        let (logger, sink) = build_logger(EnumLogLevel::Verbose);
        logger.verbose("v");
        logger.debug("d");
        logger.info("i");

        assert_eq!(sink.records().len(), 2);
        assert!(sink.messages(EnumLogRecordKind::Debug).is_empty());
    }

    #[test]
    fn logger_debug_switch_is_independent_of_level() {
        let (logger, sink) = build_logger(EnumLogLevel::Error);
        let logger = logger.with_debug(true);
        logger.debug("trace me");
        logger.info("dropped");

        assert!(sink.contains(EnumLogRecordKind::Debug, "trace me"));
        assert!(sink.messages(EnumLogRecordKind::Info).is_empty());
    }

    #[test]
    fn logger_default_is_warn_without_debug() {
        let logger = Logger::default();
        assert_eq!(logger.level(), EnumLogLevel::Warn);
        assert!(!logger.if_debug());
        assert!(!logger.is_enabled(EnumLogRecordKind::Info));
        assert!(logger.is_enabled(EnumLogRecordKind::Error));
    }

    #[test]
    fn init_tracing_second_call_reports_already_installed() {
        let _ = init_tracing("warn");
        assert!(!init_tracing("warn"));
        Logger::new(EnumLogLevel::Info).info("forwarded to tracing");
    }
}
