//! Global logging for the PER engine
//!
//! A single process-wide logger receives every [`LogEvent`]. Events at or
//! below the configured level are written to stderr; an optional log file
//! receives the same lines. Use the `log_error!`/`log_warning!`/`log_info!`/
//! `log_debug!` macros rather than calling the logger directly.

pub mod codes;
pub mod events;
#[macro_use]
pub mod macros;

pub use codes::Code;
pub use events::{LogEvent, LogLevel};

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Process-wide logger
pub struct Logger {
    min_level: Mutex<LogLevel>,
    file_sink: Mutex<Option<std::fs::File>>,
}

impl Logger {
    fn new(min_level: LogLevel) -> Self {
        Self {
            min_level: Mutex::new(min_level),
            file_sink: Mutex::new(None),
        }
    }

    /// Route an event to stderr and the optional file sink
    pub fn log_event(&self, event: LogEvent) {
        let min = *self.min_level.lock().expect("logger level lock poisoned");
        if event.level > min {
            return;
        }

        let formatted = event.format();
        eprintln!("{}", formatted);

        let mut sink = self.file_sink.lock().expect("logger sink lock poisoned");
        if let Some(file) = sink.as_mut() {
            // a full log file is not worth failing the run over
            let _ = writeln!(file, "{}", formatted);
        }
    }

    /// Change the minimum level routed to the sinks
    pub fn set_min_level(&self, level: LogLevel) {
        *self.min_level.lock().expect("logger level lock poisoned") = level;
    }

    /// Append log lines to `path` in addition to stderr
    pub fn set_log_file(&self, path: &Path) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.file_sink.lock().expect("logger sink lock poisoned") = Some(file);
        Ok(())
    }
}

static GLOBAL_LOGGER: OnceLock<Logger> = OnceLock::new();

/// Initialize global logging at the default Info level. Safe to call more
/// than once; later calls only adjust the level.
pub fn init_global_logging() -> &'static Logger {
    init_with_level(LogLevel::Info)
}

/// Initialize global logging with an explicit minimum level
pub fn init_with_level(level: LogLevel) -> &'static Logger {
    let logger = GLOBAL_LOGGER.get_or_init(|| Logger::new(level));
    logger.set_min_level(level);
    logger
}

/// Get the global logger if it has been initialized
pub fn try_get_global_logger() -> Option<&'static Logger> {
    GLOBAL_LOGGER.get()
}

fn dispatch(event: LogEvent) {
    if let Some(logger) = try_get_global_logger() {
        logger.log_event(event);
    }
}

/// Helper behind `log_error!`
pub fn log_error_with_context(
    code: Code,
    message: &str,
    line: Option<u32>,
    context: Vec<(&str, &str)>,
) {
    let mut event = LogEvent::error(code, message);
    if let Some(line) = line {
        event = event.with_line(line);
    }
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

/// Helper behind `log_warning!`
pub fn log_warning_with_context(message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::warning(message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

/// Helper behind `log_warning!` with an explicit code
pub fn log_warning_with_code(code: Code, message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::warning_with_code(code, message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

/// Helper behind `log_info!`
pub fn log_info_with_context(message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::info(message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

/// Helper behind `log_info!` with an explicit code
pub fn log_info_with_code(code: Code, message: &str, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::info_with_code(code, message);
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

/// Helper behind `log_debug!`
pub fn log_debug_with_context(message: &str, line: Option<u32>, context: Vec<(&str, &str)>) {
    let mut event = LogEvent::debug(message);
    if let Some(line) = line {
        event = event.with_line(line);
    }
    for (key, value) in context {
        event = event.with_context(key, value);
    }
    dispatch(event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let first = init_global_logging();
        let second = init_with_level(LogLevel::Debug);
        assert!(std::ptr::eq(first, second));
    }

    #[test]
    fn test_dispatch_without_init_is_a_noop() {
        // must not panic even when nothing is initialized yet in this process
        log_info_with_context("early message", vec![]);
    }
}
