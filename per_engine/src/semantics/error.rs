//! Static diagnostics produced by the type checker

use crate::ast::NodeKind;
use crate::logging::codes::{self, Code};
use crate::object::ObjectType;
use thiserror::Error;

/// One static defect in a script, carrying the source line it was found on.
///
/// The checker accumulates these and keeps going; a script with any of them
/// is rejected before execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckError {
    #[error("line {line}: identifier \"{name}\" is not declared")]
    UndeclaredIdentifier { name: String, line: u32 },

    #[error("line {line}: {kind} \"{name}\" already declared on line {previous_line}")]
    DuplicateDeclaration {
        kind: &'static str,
        name: String,
        line: u32,
        previous_line: u32,
    },

    #[error("line {line}: operator {op} cannot combine {lhs} and {rhs}")]
    OperandMismatch {
        op: String,
        lhs: ObjectType,
        rhs: ObjectType,
        line: u32,
    },

    #[error("line {line}: {context} requires an integer, found {found}")]
    NotInteger {
        context: &'static str,
        found: ObjectType,
        line: u32,
    },

    #[error("line {line}: {context} requires {expected}, found {found}")]
    WrongArgument {
        context: &'static str,
        expected: ObjectType,
        found: ObjectType,
        line: u32,
    },

    #[error("line {line}: \"{name}\" is a test and cannot be called")]
    NotCallable { name: String, line: u32 },

    #[error("line {line}: routine \"{name}\" is not defined")]
    UndefinedRoutine { name: String, line: u32 },

    #[error("line {line}: expect/assert without a preceding read to compare against")]
    ExpectWithoutRead { line: u32 },

    #[error("line {line}: expectation compares {found} against RETVAL of type {retval}")]
    ExpectTypeMismatch {
        retval: ObjectType,
        found: ObjectType,
        line: u32,
    },

    #[error("line {line}: CAN message literal \"{text}\" is malformed")]
    InvalidMessageLiteral { text: String, line: u32 },

    #[error("line {line}: reserved global {name} holds {expected} values, not {found}")]
    ReservedTypeViolation {
        name: String,
        expected: ObjectType,
        found: ObjectType,
        line: u32,
    },

    #[error("line {line}: malformed {kind} node")]
    MalformedNode { kind: NodeKind, line: u32 },

    #[error("parse reported {errors} error(s); tree is unusable")]
    UnusableParse { errors: usize },
}

impl CheckError {
    pub fn undeclared(name: &str, line: u32) -> Self {
        Self::UndeclaredIdentifier {
            name: name.to_string(),
            line,
        }
    }

    pub fn duplicate(kind: &'static str, name: &str, line: u32, previous_line: u32) -> Self {
        Self::DuplicateDeclaration {
            kind,
            name: name.to_string(),
            line,
            previous_line,
        }
    }

    pub fn operand_mismatch(op: &str, lhs: ObjectType, rhs: ObjectType, line: u32) -> Self {
        Self::OperandMismatch {
            op: op.to_string(),
            lhs,
            rhs,
            line,
        }
    }

    pub fn not_integer(context: &'static str, found: ObjectType, line: u32) -> Self {
        Self::NotInteger {
            context,
            found,
            line,
        }
    }

    pub fn wrong_argument(
        context: &'static str,
        expected: ObjectType,
        found: ObjectType,
        line: u32,
    ) -> Self {
        Self::WrongArgument {
            context,
            expected,
            found,
            line,
        }
    }

    pub fn not_callable(name: &str, line: u32) -> Self {
        Self::NotCallable {
            name: name.to_string(),
            line,
        }
    }

    pub fn undefined_routine(name: &str, line: u32) -> Self {
        Self::UndefinedRoutine {
            name: name.to_string(),
            line,
        }
    }

    pub fn invalid_message_literal(text: &str, line: u32) -> Self {
        Self::InvalidMessageLiteral {
            text: text.to_string(),
            line,
        }
    }

    pub fn reserved_type_violation(
        name: &str,
        expected: ObjectType,
        found: ObjectType,
        line: u32,
    ) -> Self {
        Self::ReservedTypeViolation {
            name: name.to_string(),
            expected,
            found,
            line,
        }
    }

    /// Source line, where the defect has one
    pub fn line(&self) -> Option<u32> {
        match self {
            Self::UndeclaredIdentifier { line, .. }
            | Self::DuplicateDeclaration { line, .. }
            | Self::OperandMismatch { line, .. }
            | Self::NotInteger { line, .. }
            | Self::WrongArgument { line, .. }
            | Self::NotCallable { line, .. }
            | Self::UndefinedRoutine { line, .. }
            | Self::ExpectWithoutRead { line }
            | Self::ExpectTypeMismatch { line, .. }
            | Self::InvalidMessageLiteral { line, .. }
            | Self::ReservedTypeViolation { line, .. }
            | Self::MalformedNode { line, .. } => Some(*line),
            Self::UnusableParse { .. } => None,
        }
    }

    /// The log code for this defect
    pub fn code(&self) -> Code {
        match self {
            Self::UndeclaredIdentifier { .. } => codes::check::UNDECLARED_IDENTIFIER,
            Self::DuplicateDeclaration { .. } => codes::check::DUPLICATE_DECLARATION,
            Self::OperandMismatch { .. }
            | Self::NotInteger { .. }
            | Self::WrongArgument { .. }
            | Self::ExpectTypeMismatch { .. } => codes::check::TYPE_MISMATCH,
            Self::NotCallable { .. } => codes::check::NOT_CALLABLE,
            Self::UndefinedRoutine { .. } => codes::check::UNDEFINED_ROUTINE,
            Self::ExpectWithoutRead { .. } => codes::check::EXPECT_WITHOUT_READ,
            Self::InvalidMessageLiteral { .. } => codes::check::INVALID_MESSAGE_LITERAL,
            Self::ReservedTypeViolation { .. } => codes::check::RESERVED_TYPE_VIOLATION,
            Self::MalformedNode { .. } | Self::UnusableParse { .. } => {
                codes::check::MALFORMED_NODE
            }
        }
    }
}

/// Accumulated static diagnostics for one analysis run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    errors: Vec<CheckError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CheckError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CheckError> {
        self.errors.iter()
    }

    /// Emit every accumulated defect through the global logger
    pub fn report(&self) {
        for error in &self.errors {
            match error.line() {
                Some(line) => {
                    crate::log_error!(error.code(), &error.to_string(), line = line)
                }
                None => crate::log_error!(error.code(), &error.to_string()),
            }
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = CheckError;
    type IntoIter = std::vec::IntoIter<CheckError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
