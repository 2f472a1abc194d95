//! Logging utilities for the application

/// Log levels for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Normal execution, no verbose flag
    Normal = 0,
    /// Info level, one verbose flag (-v)
    Info = 1,
    /// Debug level, two verbose flags (-v -v)
    Debug = 2,
}

/// Logger for application messages
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    /// Current verbosity level
    verbosity: u8,
}

impl Logger {
    /// Create a new logger with the specified verbosity
    #[must_use]
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Log a message if the current verbosity level is at least the specified level
    pub fn log(&self, msg: &str, level: LogLevel) {
        log(msg, self.verbosity, level);
    }

    /// Log at info level (verbose >= 1)
    pub fn info(&self, msg: &str) {
        self.log(msg, LogLevel::Info);
    }

    /// Log at debug level (verbose >= 2)
    pub fn debug(&self, msg: &str) {
        self.log(msg, LogLevel::Debug);
    }

    /// Warnings go to stderr regardless of verbosity
    pub fn warn(&self, msg: &str) {
        eprintln!("warn: {msg}");
    }
}

/// Log a message if the verbosity level is at least the specified level
///
/// # Arguments
///
/// * `msg` - The message to log
/// * `verbosity` - The current verbosity level (0 = normal, 1 = info, 2+ = debug)
/// * `level` - The minimum level required for this message to be logged
pub fn log(msg: &str, verbosity: u8, level: LogLevel) {
    if verbosity >= level as u8 {
        match level {
            LogLevel::Normal => println!("{msg}"),
            LogLevel::Info => println!("info: {msg}"),
            LogLevel::Debug => println!("dbg: {msg}"),
        }
    }
}
