//! Event types for PER engine logging

use super::codes::{self, Code};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }
}

/// Core log event structure
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub code: Code,
    pub message: String,
    /// Source line of the offending script statement, when known
    pub line: Option<u32>,
    pub context: HashMap<String, String>,
}

impl LogEvent {
    fn new(level: LogLevel, code: Code, message: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            code,
            message: message.to_string(),
            line: None,
            context: HashMap::new(),
        }
    }

    /// Create a new error event
    pub fn error(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Error, code, message)
    }

    /// Create a new warning event
    pub fn warning(message: &str) -> Self {
        Self::new(LogLevel::Warning, Code::new("W000"), message)
    }

    /// Create warning with specific code
    pub fn warning_with_code(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Warning, code, message)
    }

    /// Create a new info event
    pub fn info(message: &str) -> Self {
        Self::new(LogLevel::Info, codes::info::GENERIC, message)
    }

    /// Create info with specific code
    pub fn info_with_code(code: Code, message: &str) -> Self {
        Self::new(LogLevel::Info, code, message)
    }

    /// Create a debug event
    pub fn debug(message: &str) -> Self {
        Self::new(LogLevel::Debug, Code::new("D000"), message)
    }

    /// Attach the source line of the offending statement
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Add context data
    pub fn with_context(mut self, key: &str, value: &str) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }

    /// Category derived from the event code
    pub fn category(&self) -> &'static str {
        codes::get_category(self.code.as_str())
    }

    /// Format for display
    pub fn format(&self) -> String {
        let line_str = self
            .line
            .map(|l| format!(" at line {}", l))
            .unwrap_or_default();

        format!(
            "[{}] {} - {}{}",
            self.level.as_str(),
            self.code.as_str(),
            self.message,
            line_str
        )
    }

    /// Format as JSON for structured logging
    pub fn format_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::json!({
            "timestamp": self.timestamp.to_rfc3339(),
            "level": self.level.as_str(),
            "code": self.code.as_str(),
            "message": self.message,
            "category": self.category(),
        });

        if let Some(line) = self.line {
            json["line"] = serde_json::json!(line);
        }

        if !self.context.is_empty() {
            json["context"] = serde_json::Value::Object(
                self.context
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                    .collect(),
            );
        }

        serde_json::to_string(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::codes;

    #[test]
    fn test_error_event_creation() {
        let event = LogEvent::error(codes::check::TYPE_MISMATCH, "operand types differ");

        assert!(event.is_error());
        assert_eq!(event.code.as_str(), "E102");
        assert_eq!(event.category(), "StaticAnalysis");
    }

    #[test]
    fn test_event_formatting_with_line() {
        let event = LogEvent::error(codes::runtime::INDEX_OUT_OF_RANGE, "index 9 out of range")
            .with_line(14);
        let formatted = event.format();

        assert!(formatted.contains("[ERROR]"));
        assert!(formatted.contains("E200"));
        assert!(formatted.contains("at line 14"));
    }

    #[test]
    fn test_coded_warning_and_info_keep_their_code() {
        let warn = LogEvent::warning_with_code(
            codes::runtime::EXPECTATION_FAILED,
            "expectation failed",
        );
        assert_eq!(warn.level, LogLevel::Warning);
        assert_eq!(warn.code.as_str(), "E202");

        let info = LogEvent::info_with_code(codes::info::TEST_PASSED, "test passed");
        assert_eq!(info.level, LogLevel::Info);
        assert_eq!(info.code.as_str(), "I200");
    }

    #[test]
    fn test_event_with_context() {
        let event = LogEvent::info("test finished")
            .with_context("test", "t1")
            .with_context("state", "passed");

        assert_eq!(event.context.get("test"), Some(&"t1".to_string()));
        assert_eq!(event.context.get("state"), Some(&"passed".to_string()));
    }

    #[test]
    fn test_json_formatting() {
        let event = LogEvent::error(codes::device::READ_TIMEOUT, "no frame within timeout")
            .with_line(7)
            .with_context("id", "0x10");

        let json = event.format_json().unwrap();
        assert!(json.contains("\"level\":\"ERROR\""));
        assert!(json.contains("\"code\":\"E301\""));
        assert!(json.contains("\"line\":7"));
    }
}
