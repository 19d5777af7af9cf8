//! Static analysis for PER programs
//!
//! One recursive walk over the tree that resolves every expression's result
//! type, validates operator/operand compatibility, binds routine and test
//! names, and populates the registries and the global scope. Defects are
//! accumulated, never thrown: a single run surfaces every problem in a
//! script. A script with any diagnostic is rejected before execution.

pub mod error;

pub use error::{CheckError, Diagnostics};

use crate::ast::{Ast, CompareOp, MathOp, NodeId, NodeKind};
use crate::config::reserved;
use crate::object::{CanMessage, Object, ObjectType};
use crate::symbols::{GlobalScope, Routines, ScopeKind, ScopeTable, Tests};
use std::collections::HashMap;

/// What checking one routine/test body produced: its populated scope and the
/// RETVAL type the body leaves behind
struct BodyOutcome {
    scope: ScopeTable,
    retval: ObjectType,
}

/// Everything one analysis run produces
#[derive(Debug)]
pub struct CheckOutcome {
    pub routines: Routines,
    pub tests: Tests,
    pub globals: GlobalScope,
    /// Global variable declarations in source order, for the evaluator to
    /// initialize before any test or routine runs
    pub global_decls: Vec<NodeId>,
    pub diagnostics: Diagnostics,
}

impl CheckOutcome {
    pub fn is_well_typed(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// The type checker. Build with [`Checker::check`]; one instance per
/// analysis run.
pub struct Checker<'a> {
    ast: &'a Ast,
    diags: Diagnostics,
    routines: Routines,
    tests: Tests,
    globals: GlobalScope,
    global_decls: Vec<NodeId>,
    global_decl_lines: HashMap<String, u32>,
    /// RETVAL type each checked routine body leaves behind, so a call site
    /// can carry it into the caller
    routine_retvals: HashMap<String, ObjectType>,
}

impl<'a> Checker<'a> {
    /// Walk the whole program under `root` and return the populated
    /// registries together with any diagnostics.
    pub fn check(ast: &'a Ast, root: NodeId) -> CheckOutcome {
        let mut checker = Self {
            ast,
            diags: Diagnostics::new(),
            routines: Routines::new(),
            tests: Tests::new(),
            globals: GlobalScope::new(),
            global_decls: Vec::new(),
            global_decl_lines: HashMap::new(),
            routine_retvals: HashMap::new(),
        };
        checker.run(root);
        CheckOutcome {
            routines: checker.routines,
            tests: checker.tests,
            globals: checker.globals,
            global_decls: checker.global_decls,
            diagnostics: checker.diags,
        }
    }

    fn run(&mut self, root: NodeId) {
        if let Err(offender) = self.ast.check_arity() {
            self.malformed(offender);
        }

        // Names first so a routine may call one declared later in the file
        for id in self.ast.children(root).to_vec() {
            match self.ast.node(id).kind {
                NodeKind::VarDeclList => {
                    for decl in self.ast.children(id).to_vec() {
                        self.declare_global(decl);
                    }
                }
                NodeKind::VarDecl => self.declare_global(id),
                NodeKind::RoutineList => {
                    for decl in self.ast.children(id).to_vec() {
                        self.register_routine(decl);
                    }
                }
                NodeKind::Routine => self.register_routine(id),
                NodeKind::TestList => {
                    for decl in self.ast.children(id).to_vec() {
                        self.register_test(decl);
                    }
                }
                NodeKind::Test => self.register_test(id),
                _ => self.malformed(id),
            }
        }

        // Routine bodies first: their final RETVAL types feed the call sites
        // inside the tests
        for idx in 0..self.routines.len() {
            let (name, body) = {
                let def = self.routines.get(idx);
                (def.name.clone(), def.body)
            };
            let outcome = self.check_body(ScopeKind::Routine, body);
            self.routines.get_mut(idx).scope = outcome.scope;
            self.routine_retvals.insert(name, outcome.retval);
        }
        for idx in 0..self.tests.len() {
            let body = self.tests.get(idx).body;
            let outcome = self.check_body(ScopeKind::Test, body);
            self.tests.get_mut(idx).scope = outcome.scope;
        }
    }

    // ------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------

    fn declare_global(&mut self, id: NodeId) {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        if node.kind != NodeKind::VarDecl || name.is_empty() {
            self.malformed(id);
            return;
        }
        let Some(value) = self.ast.child(id, 0) else {
            self.malformed(id);
            return;
        };

        // Global initializers may reference earlier globals only
        let empty = ScopeTable::new(ScopeKind::Routine);
        let ty = self.type_of_expr(value, &empty, ObjectType::None);

        if let Some(expected) = reserved::fixed_type(&name) {
            if ty != expected && ty != ObjectType::Invalid {
                self.diags
                    .push(CheckError::reserved_type_violation(&name, expected, ty, line));
            }
            return; // already seeded
        }
        if reserved::is_reserved(&name) {
            // RETVAL: redeclaration is pointless but typed freely
            return;
        }

        if let Some(&previous) = self.global_decl_lines.get(&name) {
            self.diags
                .push(CheckError::duplicate("global", &name, line, previous));
            return;
        }
        self.global_decl_lines.insert(name.clone(), line);
        self.global_decls.push(id);
        // insert cannot collide here; reserved and duplicates are handled above
        let _ = self.globals.insert(&name, Object::default_of(ty));
    }

    fn register_routine(&mut self, id: NodeId) {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        let Some(body) = self.ast.child(id, 0) else {
            self.malformed(id);
            return;
        };
        if let Err(err) = self.routines.add(&name, line, body) {
            self.push_symbol_duplicate("routine", &name, line, err);
        }
    }

    fn register_test(&mut self, id: NodeId) {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        let Some(body) = self.ast.child(id, 0) else {
            self.malformed(id);
            return;
        };
        if let Err(err) = self.tests.add(&name, line, body) {
            self.push_symbol_duplicate("test", &name, line, err);
        }
    }

    fn push_symbol_duplicate(
        &mut self,
        kind: &'static str,
        name: &str,
        line: u32,
        err: crate::symbols::SymbolError,
    ) {
        let previous = match err {
            crate::symbols::SymbolError::DuplicateDefinition { previous_line, .. } => previous_line,
            _ => 0,
        };
        self.diags
            .push(CheckError::duplicate(kind, name, line, previous));
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn check_body(&mut self, kind: ScopeKind, body: NodeId) -> BodyOutcome {
        let mut scope = ScopeTable::new(kind);
        // RETVAL carries no usable type until the first read or assignment
        let mut retval = ObjectType::None;
        self.check_statement_list(body, &mut scope, &mut retval);
        BodyOutcome { scope, retval }
    }

    fn check_statement_list(
        &mut self,
        list: NodeId,
        scope: &mut ScopeTable,
        retval: &mut ObjectType,
    ) {
        if self.ast.node(list).kind != NodeKind::StatementList {
            self.malformed(list);
            return;
        }
        for stmt in self.ast.children(list).to_vec() {
            self.check_statement(stmt, scope, retval);
        }
    }

    fn check_statement(&mut self, id: NodeId, scope: &mut ScopeTable, retval: &mut ObjectType) {
        let node = self.ast.node(id);
        let (kind, line) = (node.kind, node.line);
        match kind {
            NodeKind::StatementList => self.check_statement_list(id, scope, retval),
            NodeKind::VarDecl => self.check_assignment(id, scope, retval),
            NodeKind::UnaryMath => {
                // increment/decrement used in statement position
                let ty = self.type_of_expr(id, scope, *retval);
                if ty == ObjectType::Invalid {
                    return;
                }
            }
            NodeKind::Call => {
                let name = node.text().to_string();
                if self.tests.contains(&name) {
                    self.diags.push(CheckError::not_callable(&name, line));
                } else if !self.routines.contains(&name) {
                    self.diags.push(CheckError::undefined_routine(&name, line));
                } else if let Some(&ty) = self.routine_retvals.get(&name) {
                    // a callee that binds RETVAL leaves that binding visible
                    // to the caller; one that never touches it leaves the
                    // caller's tracked type alone
                    if ty != ObjectType::None {
                        *retval = ty;
                    }
                }
            }
            NodeKind::Delay => self.require_int_child(id, 0, "delay", scope, *retval),
            NodeKind::Loop => {
                if let Some(cond) = self.ast.child(id, 0) {
                    if self.ast.node(cond).kind != NodeKind::Forever {
                        self.require_int(cond, "loop count", scope, *retval);
                    }
                }
                if let Some(body) = self.ast.child(id, 1) {
                    self.check_statement_list(body, scope, retval);
                }
            }
            NodeKind::If => {
                if let Some(cond) = self.ast.child(id, 0) {
                    self.require_int(cond, "if condition", scope, *retval);
                } else {
                    self.malformed(id);
                }
                if let Some(then) = self.ast.child(id, 1) {
                    self.check_statement_list(then, scope, retval);
                }
                if let Some(alt) = self.ast.child(id, 2) {
                    if self.ast.node(alt).kind == NodeKind::Else {
                        if let Some(else_body) = self.ast.child(alt, 0) {
                            self.check_statement_list(else_body, scope, retval);
                        }
                    } else {
                        self.malformed(alt);
                    }
                }
            }
            NodeKind::Expect | NodeKind::Assert => {
                if let Some(chain) = self.ast.child(id, 0) {
                    self.check_expectation(chain, scope, *retval, line);
                } else {
                    self.malformed(id);
                }
            }
            NodeKind::Print | NodeKind::Println | NodeKind::Prompt => {
                if let Some(arg) = self.ast.child(id, 0) {
                    self.type_of_expr(arg, scope, *retval);
                } else {
                    self.malformed(id);
                }
            }
            NodeKind::DigitalRead => {
                self.require_int_child(id, 0, "digital-read pin", scope, *retval);
                *retval = ObjectType::Integer;
            }
            NodeKind::AnalogRead => {
                self.require_int_child(id, 0, "analog-read pin", scope, *retval);
                *retval = ObjectType::Integer;
            }
            NodeKind::DigitalWrite => {
                self.require_int_child(id, 0, "digital-write pin", scope, *retval);
                self.require_int_child(id, 1, "digital-write value", scope, *retval);
            }
            NodeKind::AnalogWrite => {
                self.require_int_child(id, 0, "analog-write pin", scope, *retval);
                self.require_int_child(id, 1, "analog-write value", scope, *retval);
            }
            NodeKind::SerialTx => {
                if let Some(arg) = self.ast.child(id, 0) {
                    self.type_of_expr(arg, scope, *retval);
                } else {
                    self.malformed(id);
                }
            }
            NodeKind::SerialRx => *retval = ObjectType::String,
            NodeKind::SendMsg => {
                self.require_int_child(id, 0, "send-msg id", scope, *retval);
                if let Some(payload) = self.ast.child(id, 1) {
                    let ty = self.type_of_expr(payload, scope, *retval);
                    if ty != ObjectType::CanMessage && ty != ObjectType::Invalid {
                        self.diags.push(CheckError::wrong_argument(
                            "send-msg payload",
                            ObjectType::CanMessage,
                            ty,
                            line,
                        ));
                    }
                }
            }
            NodeKind::ReadMsg => {
                self.require_int_child(id, 0, "read-msg id", scope, *retval);
                *retval = ObjectType::CanMessage;
            }
            _ => self.malformed(id),
        }
    }

    /// Declaration-or-assignment. A plain target rebinds where the name
    /// resolves (current scope, then global, else a fresh local binding); an
    /// access-modified target mutates a CAN message in place. Either way the
    /// assigned type becomes RETVAL's tracked type.
    fn check_assignment(&mut self, id: NodeId, scope: &mut ScopeTable, retval: &mut ObjectType) {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        let children = self.ast.children(id).to_vec();

        match children.as_slice() {
            [value] => {
                let ty = self.type_of_expr(*value, scope, *retval);
                if ty == ObjectType::Invalid {
                    return;
                }
                if let Some(expected) = reserved::fixed_type(&name) {
                    if ty != expected {
                        self.diags.push(CheckError::reserved_type_violation(
                            &name, expected, ty, line,
                        ));
                        return;
                    }
                }
                let replacement = Object::default_of(ty);
                if let Some(binding) = scope.lookup_local_mut(&name) {
                    *binding = replacement;
                } else if let Some(binding) = self.globals.lookup_mut(&name) {
                    *binding = replacement;
                } else {
                    // first assignment declares the name in the current scope
                    let _ = scope.insert(&name, replacement);
                }
                *retval = ty;
            }
            [modifier, value] => {
                let base = scope.object_type(&name, &self.globals);
                match base {
                    None => self.diags.push(CheckError::undeclared(&name, line)),
                    Some(ObjectType::CanMessage) => {}
                    Some(found) => self.diags.push(CheckError::wrong_argument(
                        "message access",
                        ObjectType::CanMessage,
                        found,
                        line,
                    )),
                }
                match self.ast.node(*modifier).kind {
                    NodeKind::Index => {
                        self.require_int_child(*modifier, 0, "message index", scope, *retval)
                    }
                    NodeKind::Length => {}
                    _ => self.malformed(*modifier),
                }
                self.require_int(*value, "message byte assignment", scope, *retval);
                *retval = ObjectType::Integer;
            }
            _ => self.malformed(id),
        }
    }

    /// An expect/assert chain: a single comparison or comparisons joined by
    /// and/or, each implicitly comparing RETVAL against its other operand.
    fn check_expectation(
        &mut self,
        id: NodeId,
        scope: &ScopeTable,
        retval: ObjectType,
        stmt_line: u32,
    ) {
        let node = self.ast.node(id);
        let (kind, line) = (node.kind, node.line);
        match kind {
            NodeKind::And | NodeKind::Or => {
                let children = self.ast.children(id).to_vec();
                for part in children {
                    self.check_expectation(part, scope, retval, stmt_line);
                }
            }
            NodeKind::Comparison => {
                if retval == ObjectType::None {
                    self.diags.push(CheckError::ExpectWithoutRead { line: stmt_line });
                    return;
                }
                let Some(op) = CompareOp::parse(self.ast.node(id).text()) else {
                    self.malformed(id);
                    return;
                };
                let Some(other) = self.expectation_operand(id) else {
                    self.malformed(id);
                    return;
                };
                let found = self.type_of_expr(other, scope, retval);
                if found == ObjectType::Invalid {
                    return;
                }
                let length_compare = op.is_equality()
                    && retval == ObjectType::CanMessage
                    && found == ObjectType::Integer;
                if length_compare {
                    return;
                }
                let agrees = if op.is_equality() {
                    found == retval
                } else {
                    found == ObjectType::Integer && retval == ObjectType::Integer
                };
                if !agrees {
                    self.diags.push(CheckError::ExpectTypeMismatch {
                        retval,
                        found,
                        line,
                    });
                }
            }
            _ => self.malformed(id),
        }
    }

    /// The non-RETVAL side of an expectation comparison. The front end
    /// desugars `expect EQ x` into a comparison whose left operand is the
    /// RETVAL identifier.
    fn expectation_operand(&self, id: NodeId) -> Option<NodeId> {
        let lhs = self.ast.child(id, 0)?;
        let rhs = self.ast.child(id, 1)?;
        let lhs_node = self.ast.node(lhs);
        if lhs_node.kind == NodeKind::Identifier && lhs_node.text() == reserved::RETVAL {
            Some(rhs)
        } else {
            Some(lhs)
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn type_of_expr(&mut self, id: NodeId, scope: &ScopeTable, retval: ObjectType) -> ObjectType {
        let node = self.ast.node(id);
        let (kind, line) = (node.kind, node.line);
        match kind {
            NodeKind::IntegerLiteral | NodeKind::HexLiteral => ObjectType::Integer,
            NodeKind::StringLiteral => ObjectType::String,
            NodeKind::MessageLiteral => {
                let text = node.text().to_string();
                if CanMessage::parse(&text).is_valid() {
                    ObjectType::CanMessage
                } else {
                    self.diags
                        .push(CheckError::invalid_message_literal(&text, line));
                    ObjectType::Invalid
                }
            }
            NodeKind::Identifier => self.type_of_identifier(id, scope, retval),
            NodeKind::BinaryMath => self.type_of_binary_math(id, scope, retval),
            NodeKind::UnaryMath => {
                let text = node.text().to_string();
                if MathOp::parse(&text).is_none() {
                    self.malformed(id);
                    return ObjectType::Invalid;
                }
                let Some(operand) = self.ast.child(id, 0) else {
                    self.malformed(id);
                    return ObjectType::Invalid;
                };
                let ty = self.type_of_expr(operand, scope, retval);
                match ty {
                    ObjectType::Integer => ObjectType::Integer,
                    ObjectType::Invalid => ObjectType::Invalid,
                    found => {
                        self.diags
                            .push(CheckError::not_integer("unary math", found, line));
                        ObjectType::Invalid
                    }
                }
            }
            NodeKind::Comparison => self.type_of_comparison(id, scope, retval),
            NodeKind::And | NodeKind::Or => {
                let op = if kind == NodeKind::And { "and" } else { "or" };
                let (Some(lhs), Some(rhs)) = (self.ast.child(id, 0), self.ast.child(id, 1)) else {
                    self.malformed(id);
                    return ObjectType::Invalid;
                };
                let lt = self.type_of_expr(lhs, scope, retval);
                let rt = self.type_of_expr(rhs, scope, retval);
                if lt == ObjectType::Invalid || rt == ObjectType::Invalid {
                    return ObjectType::Invalid;
                }
                if lt != ObjectType::Integer || rt != ObjectType::Integer {
                    self.diags
                        .push(CheckError::operand_mismatch(op, lt, rt, line));
                    return ObjectType::Invalid;
                }
                ObjectType::Integer
            }
            _ => {
                self.malformed(id);
                ObjectType::Invalid
            }
        }
    }

    fn type_of_identifier(
        &mut self,
        id: NodeId,
        scope: &ScopeTable,
        retval: ObjectType,
    ) -> ObjectType {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        let base = if name == reserved::RETVAL {
            retval
        } else {
            match scope.object_type(&name, &self.globals) {
                Some(ty) => ty,
                None => {
                    self.diags.push(CheckError::undeclared(&name, line));
                    return ObjectType::Invalid;
                }
            }
        };

        let Some(modifier) = self.ast.child(id, 0) else {
            return base;
        };
        // `msg[idx]` and `msg.length` both read out an integer
        if base != ObjectType::CanMessage {
            self.diags.push(CheckError::wrong_argument(
                "message access",
                ObjectType::CanMessage,
                base,
                line,
            ));
            return ObjectType::Invalid;
        }
        match self.ast.node(modifier).kind {
            NodeKind::Index => {
                self.require_int_child(modifier, 0, "message index", scope, retval);
                ObjectType::Integer
            }
            NodeKind::Length => ObjectType::Integer,
            _ => {
                self.malformed(modifier);
                ObjectType::Invalid
            }
        }
    }

    fn type_of_binary_math(
        &mut self,
        id: NodeId,
        scope: &ScopeTable,
        retval: ObjectType,
    ) -> ObjectType {
        let node = self.ast.node(id);
        let (line, text) = (node.line, node.text().to_string());
        let Some(op) = MathOp::parse(&text) else {
            self.malformed(id);
            return ObjectType::Invalid;
        };
        let (Some(lhs), Some(rhs)) = (self.ast.child(id, 0), self.ast.child(id, 1)) else {
            self.malformed(id);
            return ObjectType::Invalid;
        };
        let lt = self.type_of_expr(lhs, scope, retval);
        let rt = self.type_of_expr(rhs, scope, retval);
        if lt == ObjectType::Invalid || rt == ObjectType::Invalid {
            return ObjectType::Invalid;
        }
        match op {
            MathOp::Add => {
                // concatenation when either side is a string; integer math
                // otherwise; an integer never combines with a CAN message
                if lt == ObjectType::String || rt == ObjectType::String {
                    ObjectType::String
                } else if lt == ObjectType::Integer && rt == ObjectType::Integer {
                    ObjectType::Integer
                } else {
                    self.diags
                        .push(CheckError::operand_mismatch(op.as_str(), lt, rt, line));
                    ObjectType::Invalid
                }
            }
            MathOp::Sub | MathOp::Mul | MathOp::Div => {
                if lt == ObjectType::Integer && rt == ObjectType::Integer {
                    ObjectType::Integer
                } else {
                    self.diags
                        .push(CheckError::operand_mismatch(op.as_str(), lt, rt, line));
                    ObjectType::Invalid
                }
            }
            MathOp::Increment | MathOp::Decrement => {
                self.malformed(id);
                ObjectType::Invalid
            }
        }
    }

    fn type_of_comparison(
        &mut self,
        id: NodeId,
        scope: &ScopeTable,
        retval: ObjectType,
    ) -> ObjectType {
        let node = self.ast.node(id);
        let (line, text) = (node.line, node.text().to_string());
        let Some(op) = CompareOp::parse(&text) else {
            self.malformed(id);
            return ObjectType::Invalid;
        };
        let (Some(lhs), Some(rhs)) = (self.ast.child(id, 0), self.ast.child(id, 1)) else {
            self.malformed(id);
            return ObjectType::Invalid;
        };
        let lt = self.type_of_expr(lhs, scope, retval);
        let rt = self.type_of_expr(rhs, scope, retval);
        if lt == ObjectType::Invalid || rt == ObjectType::Invalid {
            return ObjectType::Invalid;
        }

        // EQ/NE between a message and an integer compares the logical length
        let length_compare = op.is_equality()
            && ((lt == ObjectType::CanMessage && rt == ObjectType::Integer)
                || (lt == ObjectType::Integer && rt == ObjectType::CanMessage));
        if length_compare {
            return ObjectType::Integer;
        }
        let well_typed = if op.is_equality() {
            lt == rt
        } else {
            lt == ObjectType::Integer && rt == ObjectType::Integer
        };
        if !well_typed {
            self.diags
                .push(CheckError::operand_mismatch(op.as_str(), lt, rt, line));
            return ObjectType::Invalid;
        }
        ObjectType::Integer
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_int(
        &mut self,
        id: NodeId,
        context: &'static str,
        scope: &ScopeTable,
        retval: ObjectType,
    ) {
        let line = self.ast.node(id).line;
        let ty = self.type_of_expr(id, scope, retval);
        if ty != ObjectType::Integer && ty != ObjectType::Invalid {
            self.diags.push(CheckError::not_integer(context, ty, line));
        }
    }

    fn require_int_child(
        &mut self,
        parent: NodeId,
        n: usize,
        context: &'static str,
        scope: &ScopeTable,
        retval: ObjectType,
    ) {
        match self.ast.child(parent, n) {
            Some(child) => self.require_int(child, context, scope, retval),
            None => self.malformed(parent),
        }
    }

    fn malformed(&mut self, id: NodeId) {
        let node = self.ast.node(id);
        self.diags.push(CheckError::MalformedNode {
            kind: node.kind,
            line: node.line,
        });
    }
}
