use crate::utils::log_utils::Logger;
use std::sync::{Arc, Mutex};

/// Severity for update-check messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckLogLevel {
    Debug,
    Info,
    Warn,
}

/// Interface for routing checker feedback to the active frontend.
///
/// Shared across check tasks, hence `Send + Sync`.
pub trait CheckLogger: Send + Sync {
    fn log(&self, level: CheckLogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(CheckLogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(CheckLogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(CheckLogLevel::Warn, message);
    }
}

/// CLI implementation that proxies through the shared [`Logger`].
#[derive(Clone)]
pub struct CliCheckLogger {
    logger: Logger,
}

impl CliCheckLogger {
    #[must_use]
    pub fn new(logger: &Logger) -> Self {
        Self { logger: *logger }
    }
}

impl CheckLogger for CliCheckLogger {
    fn log(&self, level: CheckLogLevel, message: &str) {
        match level {
            CheckLogLevel::Debug => self.logger.debug(message),
            CheckLogLevel::Info => self.logger.info(message),
            CheckLogLevel::Warn => self.logger.warn(message),
        }
    }
}

/// Discards everything; the default when no frontend is attached.
#[derive(Clone, Copy, Default)]
pub struct NullCheckLogger;

impl CheckLogger for NullCheckLogger {
    fn log(&self, _level: CheckLogLevel, _message: &str) {}
}

/// Keeps every message in memory so tests can assert on them.
#[derive(Clone, Default)]
pub struct RecordingLogger {
    messages: Arc<Mutex<Vec<(CheckLogLevel, String)>>>,
}

impl CheckLogger for RecordingLogger {
    fn log(&self, level: CheckLogLevel, message: &str) {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

impl RecordingLogger {
    #[must_use]
    pub fn logs(&self) -> Vec<(CheckLogLevel, String)> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
