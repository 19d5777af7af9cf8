//! Error types for symbol tables and the routine/test registries

use crate::object::ObjectType;
use thiserror::Error;

/// Symbol table and registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    /// A routine or test name declared twice
    #[error("{kind} \"{name}\" already declared on line {previous_line}")]
    DuplicateDefinition {
        kind: &'static str,
        name: String,
        previous_line: u32,
    },

    /// Lookup of a routine or test that was never declared
    #[error("{kind} \"{name}\" is not defined")]
    UndefinedDefinition { kind: &'static str, name: String },

    /// A reserved global assigned a value of the wrong type
    #[error("reserved global {name} holds {expected} values, not {found}")]
    ReservedTypeViolation {
        name: String,
        expected: ObjectType,
        found: ObjectType,
    },
}

impl SymbolError {
    pub fn duplicate(kind: &'static str, name: &str, previous_line: u32) -> Self {
        Self::DuplicateDefinition {
            kind,
            name: name.to_string(),
            previous_line,
        }
    }

    pub fn undefined(kind: &'static str, name: &str) -> Self {
        Self::UndefinedDefinition {
            kind,
            name: name.to_string(),
        }
    }

    pub fn reserved_type_violation(name: &str, expected: ObjectType, found: ObjectType) -> Self {
        Self::ReservedTypeViolation {
            name: name.to_string(),
            expected,
            found,
        }
    }
}
