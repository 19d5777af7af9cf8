//! Runtime object model for the PER language
//!
//! A closed set of value kinds, dispatched by pattern matching rather than a
//! class hierarchy: the type tag and the payload are inseparable by
//! construction.

pub mod can_msg;

pub use can_msg::{CanMessage, CanMessageError};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Static type tags for runtime values and expression results.
///
/// `Invalid` is never the tag of a live [`Object`]; it is the static type of
/// an expression the checker has rejected (e.g. an ill-formed message
/// literal) and poisons any expression containing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    None,
    Integer,
    String,
    CanMessage,
    Invalid,
}

impl ObjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Integer => "integer",
            Self::String => "string",
            Self::CanMessage => "can-message",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A runtime value. Objects are value-like: cloning is the only way two
/// bindings ever hold the same content, so no binding aliases another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    None,
    Integer(i64),
    String(String),
    CanMessage(CanMessage),
}

impl Default for Object {
    fn default() -> Self {
        Self::None
    }
}

impl Object {
    /// The value's type tag
    pub fn type_tag(&self) -> ObjectType {
        match self {
            Self::None => ObjectType::None,
            Self::Integer(_) => ObjectType::Integer,
            Self::String(_) => ObjectType::String,
            Self::CanMessage(_) => ObjectType::CanMessage,
        }
    }

    /// Default value of a given type, used when a scope entry is created
    /// before its first assignment executes
    pub fn default_of(ty: ObjectType) -> Self {
        match ty {
            ObjectType::Integer => Self::Integer(0),
            ObjectType::String => Self::String(String::new()),
            ObjectType::CanMessage => Self::CanMessage(CanMessage::default()),
            ObjectType::None | ObjectType::Invalid => Self::None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&CanMessage> {
        match self {
            Self::CanMessage(m) => Some(m),
            _ => None,
        }
    }

    /// Truthiness used by `if` and `loop` conditions
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Integer(i) => *i != 0,
            Self::String(s) => !s.is_empty(),
            Self::CanMessage(m) => !m.is_empty(),
            Self::None => false,
        }
    }
}

impl fmt::Display for Object {
    /// The human-readable rendering used by print/println/prompt
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "(none)"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::String(s) => write!(f, "{}", s),
            Self::CanMessage(m) => write!(f, "{}", m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags() {
        assert_eq!(Object::None.type_tag(), ObjectType::None);
        assert_eq!(Object::Integer(3).type_tag(), ObjectType::Integer);
        assert_eq!(
            Object::String("x".into()).type_tag(),
            ObjectType::String
        );
        assert_eq!(
            Object::CanMessage(CanMessage::default()).type_tag(),
            ObjectType::CanMessage
        );
    }

    #[test]
    fn test_default_of() {
        assert_eq!(Object::default_of(ObjectType::Integer), Object::Integer(0));
        assert_eq!(Object::default_of(ObjectType::None), Object::None);
    }

    #[test]
    fn test_truthiness() {
        assert!(Object::Integer(1).is_truthy());
        assert!(!Object::Integer(0).is_truthy());
        assert!(!Object::None.is_truthy());
        assert!(Object::String("x".into()).is_truthy());
        assert!(!Object::String(String::new()).is_truthy());
    }

    #[test]
    fn test_render() {
        assert_eq!(Object::Integer(42).to_string(), "42");
        assert_eq!(Object::String("hello".into()).to_string(), "hello");
        assert_eq!(Object::None.to_string(), "(none)");
    }
}
