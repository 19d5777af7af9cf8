//! AST node definitions for the PER language
//!
//! The grammar front end lives out of tree; it hands the engine a finished
//! tree of these nodes. Nodes are write-once after parsing: both the type
//! checker and the evaluator only read them.
//!
//! Design principles:
//! - One `NodeKind` variant per syntactic form
//! - Line tracking on every node for diagnostics
//! - Serde compatible: the serialized tree is the parse artifact format

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every syntactic form the grammar can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // literals
    IntegerLiteral,
    HexLiteral,
    StringLiteral,
    /// A `|`-delimited CAN message literal; payload holds the raw text
    MessageLiteral,
    Identifier,

    // expressions
    BinaryMath,
    UnaryMath,
    Comparison,
    And,
    Or,

    // access modifiers on message-typed identifiers
    Index,
    Length,

    // statements
    VarDecl,
    Call,
    Delay,
    Loop,
    Forever,
    If,
    Else,
    Expect,
    Assert,
    Print,
    Println,
    Prompt,
    DigitalRead,
    DigitalWrite,
    AnalogRead,
    AnalogWrite,
    SerialTx,
    SerialRx,
    SendMsg,
    ReadMsg,

    // declarations and list wrappers
    Routine,
    Test,
    StatementList,
    VarDeclList,
    RoutineList,
    TestList,
}

impl NodeKind {
    /// Child count the kind demands, where it is fixed
    pub fn fixed_arity(&self) -> Option<usize> {
        match self {
            Self::BinaryMath | Self::Comparison | Self::And | Self::Or | Self::SendMsg => Some(2),
            Self::UnaryMath
            | Self::Index
            | Self::Delay
            | Self::Print
            | Self::Println
            | Self::Prompt
            | Self::SerialTx
            | Self::ReadMsg
            | Self::DigitalRead
            | Self::AnalogRead
            | Self::Else
            | Self::Expect
            | Self::Assert => Some(1),
            Self::DigitalWrite | Self::AnalogWrite | Self::Loop => Some(2),
            Self::Forever | Self::SerialRx | Self::Length => Some(0),
            // literals take no argument children; identifiers may carry one
            // access-modifier child; vardecl, if, routine, test, and the list
            // wrappers are variable
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::IntegerLiteral | Self::HexLiteral | Self::StringLiteral | Self::MessageLiteral
        )
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::Identifier)
    }

    pub fn is_list(&self) -> bool {
        matches!(
            self,
            Self::StatementList | Self::VarDeclList | Self::RoutineList | Self::TestList
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntegerLiteral => "integer-literal",
            Self::HexLiteral => "hex-literal",
            Self::StringLiteral => "string-literal",
            Self::MessageLiteral => "message-literal",
            Self::Identifier => "identifier",
            Self::BinaryMath => "binary-math",
            Self::UnaryMath => "unary-math",
            Self::Comparison => "comparison",
            Self::And => "and",
            Self::Or => "or",
            Self::Index => "index",
            Self::Length => "length",
            Self::VarDecl => "vardecl",
            Self::Call => "call",
            Self::Delay => "delay",
            Self::Loop => "loop",
            Self::Forever => "forever",
            Self::If => "if",
            Self::Else => "else",
            Self::Expect => "expect",
            Self::Assert => "assert",
            Self::Print => "print",
            Self::Println => "println",
            Self::Prompt => "prompt",
            Self::DigitalRead => "digital-read",
            Self::DigitalWrite => "digital-write",
            Self::AnalogRead => "analog-read",
            Self::AnalogWrite => "analog-write",
            Self::SerialTx => "serial-tx",
            Self::SerialRx => "serial-rx",
            Self::SendMsg => "send-msg",
            Self::ReadMsg => "read-msg",
            Self::Routine => "routine",
            Self::Test => "test",
            Self::StatementList => "statement-list",
            Self::VarDeclList => "vardecl-list",
            Self::RoutineList => "routine-list",
            Self::TestList => "test-list",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Math operators carried in a binary/unary math node's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
    Increment,
    Decrement,
}

impl MathOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "+" => Some(Self::Add),
            "-" => Some(Self::Sub),
            "*" => Some(Self::Mul),
            "/" => Some(Self::Div),
            "++" => Some(Self::Increment),
            "--" => Some(Self::Decrement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Increment => "++",
            Self::Decrement => "--",
        }
    }
}

/// Comparison operators carried in a comparison node's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EQ" => Some(Self::Eq),
            "NE" => Some(Self::Ne),
            "GT" => Some(Self::Gt),
            "LT" => Some(Self::Lt),
            "GE" => Some(Self::Ge),
            "LE" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Gt => "GT",
            Self::Lt => "LT",
            Self::Ge => "GE",
            Self::Le => "LE",
        }
    }

    /// EQ and NE apply to every object type; the ordered operators compare
    /// integers only
    pub fn is_equality(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }
}

/// The literal payload of a node: a string or an integer, never both
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Payload {
    #[default]
    None,
    Str(String),
    Int(i64),
}

impl Payload {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A single tree node: kind, source line, payload, ordered children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub line: u32,
    #[serde(default)]
    pub payload: Payload,
    #[serde(default)]
    pub children: Vec<super::NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind, line: u32) -> Self {
        Self {
            kind,
            line,
            payload: Payload::None,
            children: Vec::new(),
        }
    }

    pub fn with_str(kind: NodeKind, line: u32, s: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            payload: Payload::Str(s.into()),
            children: Vec::new(),
        }
    }

    pub fn with_int(kind: NodeKind, line: u32, i: i64) -> Self {
        Self {
            kind,
            line,
            payload: Payload::Int(i),
            children: Vec::new(),
        }
    }

    /// Payload string, or "" for nodes without one
    pub fn text(&self) -> &str {
        self.payload.as_str().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_arity_table() {
        assert_eq!(NodeKind::BinaryMath.fixed_arity(), Some(2));
        assert_eq!(NodeKind::UnaryMath.fixed_arity(), Some(1));
        assert_eq!(NodeKind::Forever.fixed_arity(), Some(0));
        assert_eq!(NodeKind::VarDecl.fixed_arity(), None);
    }

    #[test]
    fn test_kind_predicates() {
        assert!(NodeKind::HexLiteral.is_literal());
        assert!(NodeKind::Identifier.is_identifier());
        assert!(NodeKind::StatementList.is_list());
        assert!(!NodeKind::Call.is_literal());
    }

    #[test]
    fn test_compare_op_parse_roundtrip() {
        for op in ["EQ", "NE", "GT", "LT", "GE", "LE"] {
            assert_eq!(CompareOp::parse(op).unwrap().as_str(), op);
        }
        assert_eq!(CompareOp::parse("APPROX"), None);
    }

    #[test]
    fn test_math_op_parse() {
        assert_eq!(MathOp::parse("+"), Some(MathOp::Add));
        assert_eq!(MathOp::parse("++"), Some(MathOp::Increment));
        assert_eq!(MathOp::parse("%"), None);
    }
}
