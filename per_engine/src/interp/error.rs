//! Runtime error types for the evaluator
//!
//! Runtime errors are local to the statement that raised them: they are
//! logged with operation and line, the statement is abandoned, and execution
//! proceeds. Only a failed `assert` halts a run, and that is not an error.

use crate::devices::DeviceError;
use crate::logging::codes::{self, Code};
use crate::object::CanMessageError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("line {line}: message index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: u8, line: u32 },

    #[error("line {line}: message length {requested} out of range")]
    LengthOutOfRange { requested: i64, line: u32 },

    #[error("line {line}: byte value {value} exceeds 0xFF")]
    ByteOutOfRange { value: i64, line: u32 },

    #[error("line {line}: {source}")]
    Device { line: u32, source: DeviceError },

    #[error("line {line}: call depth {depth} exceeds the nesting limit")]
    CallDepthExceeded { depth: usize, line: u32 },

    #[error("line {line}: division by zero")]
    DivisionByZero { line: u32 },

    #[error("line {line}: internal evaluator fault: {detail}")]
    Internal { detail: String, line: u32 },
}

impl RuntimeError {
    pub fn device(source: DeviceError, line: u32) -> Self {
        Self::Device { line, source }
    }

    pub fn message(source: CanMessageError, line: u32) -> Self {
        match source {
            CanMessageError::IndexOutOfRange { index, len } => {
                Self::IndexOutOfRange { index, len, line }
            }
            CanMessageError::LengthOutOfRange { requested, .. } => {
                Self::LengthOutOfRange { requested, line }
            }
            CanMessageError::ByteOutOfRange { value } => Self::ByteOutOfRange { value, line },
        }
    }

    pub fn internal(detail: impl Into<String>, line: u32) -> Self {
        Self::Internal {
            detail: detail.into(),
            line,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            Self::IndexOutOfRange { line, .. }
            | Self::LengthOutOfRange { line, .. }
            | Self::ByteOutOfRange { line, .. }
            | Self::Device { line, .. }
            | Self::CallDepthExceeded { line, .. }
            | Self::DivisionByZero { line }
            | Self::Internal { line, .. } => *line,
        }
    }

    pub fn code(&self) -> Code {
        match self {
            Self::IndexOutOfRange { .. } | Self::ByteOutOfRange { .. } => {
                codes::runtime::INDEX_OUT_OF_RANGE
            }
            Self::LengthOutOfRange { .. } => codes::runtime::LENGTH_OUT_OF_RANGE,
            Self::Device { source, .. } => source.code(),
            Self::CallDepthExceeded { .. } => codes::runtime::CALL_DEPTH_EXCEEDED,
            Self::DivisionByZero { .. } => codes::runtime::DIVISION_BY_ZERO,
            Self::Internal { .. } => codes::system::INTERNAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_message_error_carries_line() {
        let err = RuntimeError::message(CanMessageError::IndexOutOfRange { index: 9, len: 3 }, 12);
        assert_matches!(
            err,
            RuntimeError::IndexOutOfRange {
                index: 9,
                len: 3,
                line: 12
            }
        );
        assert_eq!(err.line(), 12);
        assert_eq!(err.code(), codes::runtime::INDEX_OUT_OF_RANGE);
    }

    #[test]
    fn test_device_error_keeps_its_code() {
        let err = RuntimeError::device(DeviceError::Timeout { waited_ms: 1500 }, 7);
        assert_eq!(err.code(), codes::device::READ_TIMEOUT);
    }
}
