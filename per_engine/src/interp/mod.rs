//! Tree-walking evaluator for validated PER programs
//!
//! Executes statement lists by dispatching each node on its kind, resolving
//! names through the routine/test scope with global fallback, and driving
//! the device collaborators for the hardware-facing built-ins. Expression
//! evaluation returns owned [`Object`]s; only assignment moves a value into
//! a scope, so intermediate results die with their statement.
//!
//! Runtime errors are logged and the offending statement abandoned;
//! execution continues. A failed `assert` is the only condition that halts
//! the rest of a run, and the halt flag lives in the per-run
//! [`ExecContext`], not a process global.

pub mod error;

pub use error::RuntimeError;

use crate::ast::{Ast, CompareOp, MathOp, NodeId, NodeKind};
use crate::config::constants::limits::{CAN_READ_TIMEOUT_MS, MAX_CALL_DEPTH};
use crate::config::reserved;
use crate::devices::{CanFrame, Devices};
use crate::logging::codes;
use crate::object::{CanMessage, Object};
use crate::symbols::{GlobalScope, Routines, SymbolError, TestState, Tests};
use crate::{log_debug, log_error, log_info, log_warning};
use std::io::Write;
use std::time::{Duration, Instant};

/// Where rendered print/println/prompt output goes
pub trait OutputSink {
    fn write(&mut self, text: &str);
    fn writeln(&mut self, text: &str);
}

/// Process stdout
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn writeln(&mut self, text: &str) {
        println!("{}", text);
    }
}

/// In-memory capture, for tests and report generation
#[derive(Debug, Default)]
pub struct CaptureSink {
    buffer: String,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }

    pub fn lines(&self) -> Vec<&str> {
        self.buffer.lines().collect()
    }
}

impl OutputSink for CaptureSink {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    fn writeln(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }
}

/// Which scope a statement executes in. Copyable so the evaluator can
/// re-fetch the backing table whenever it needs a fresh borrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRef {
    Global,
    Routine(usize),
    Test(usize),
}

/// Per-run execution state threaded through the recursive walk
#[derive(Debug, Default)]
pub struct ExecContext {
    /// Set by a failed assert; checked before each statement
    pub halt: bool,
    pub call_depth: usize,
    pub current_test: Option<usize>,
}

impl ExecContext {
    fn for_test(idx: usize) -> Self {
        Self {
            current_test: Some(idx),
            ..Self::default()
        }
    }
}

/// The evaluator. Borrows the program pieces for one run.
pub struct Interpreter<'a> {
    ast: &'a Ast,
    routines: &'a mut Routines,
    tests: &'a mut Tests,
    globals: &'a mut GlobalScope,
    devices: &'a mut Devices,
    output: &'a mut dyn OutputSink,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ast: &'a Ast,
        routines: &'a mut Routines,
        tests: &'a mut Tests,
        globals: &'a mut GlobalScope,
        devices: &'a mut Devices,
        output: &'a mut dyn OutputSink,
    ) -> Self {
        Self {
            ast,
            routines,
            tests,
            globals,
            devices,
            output,
        }
    }

    /// Evaluate the global declaration section, in source order
    pub fn init_globals(&mut self, decls: &[NodeId]) {
        let mut ctx = ExecContext::default();
        for &decl in decls {
            if let Err(err) = self.exec_statement(decl, ScopeRef::Global, &mut ctx) {
                report_runtime_error(&err);
            }
        }
    }

    /// Run every test in definition order. The halt flag resets between
    /// tests, so one test's assertion failure does not abort the rest.
    pub fn run_all_tests(&mut self) {
        for idx in 0..self.tests.len() {
            self.run_test_index(idx);
        }
    }

    pub fn run_test(&mut self, name: &str) -> Result<TestState, SymbolError> {
        let idx = self
            .tests
            .index_of(name)
            .ok_or_else(|| SymbolError::undefined("test", name))?;
        Ok(self.run_test_index(idx))
    }

    pub fn run_routine(&mut self, name: &str) -> Result<(), SymbolError> {
        let idx = self
            .routines
            .index_of(name)
            .ok_or_else(|| SymbolError::undefined("routine", name))?;
        let body = self.routines.get(idx).body;
        let mut ctx = ExecContext::default();
        self.exec_list(body, ScopeRef::Routine(idx), &mut ctx);
        Ok(())
    }

    fn run_test_index(&mut self, idx: usize) -> TestState {
        let (name, body) = {
            let def = self.tests.get_mut(idx);
            def.reset();
            def.begin_run();
            (def.name.clone(), def.body)
        };

        let mut ctx = ExecContext::for_test(idx);
        self.exec_list(body, ScopeRef::Test(idx), &mut ctx);

        let def = self.tests.get_mut(idx);
        def.finish_run();
        let state = def.state();
        match state {
            TestState::Passed => {
                log_info!(code = codes::info::TEST_PASSED, "test passed", "test" => name)
            }
            _ => log_info!(code = codes::info::TEST_FAILED, "test failed", "test" => name),
        }
        state
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn exec_list(&mut self, list: NodeId, scope: ScopeRef, ctx: &mut ExecContext) {
        for stmt in self.ast.children(list).to_vec() {
            if ctx.halt {
                break;
            }
            self.trace_statement(stmt);
            if let Err(err) = self.exec_statement(stmt, scope, ctx) {
                report_runtime_error(&err);
            }
        }
    }

    fn exec_statement(
        &mut self,
        id: NodeId,
        scope: ScopeRef,
        ctx: &mut ExecContext,
    ) -> Result<(), RuntimeError> {
        let node = self.ast.node(id);
        let (kind, line) = (node.kind, node.line);
        match kind {
            NodeKind::StatementList => {
                self.exec_list(id, scope, ctx);
                Ok(())
            }
            NodeKind::VarDecl => self.exec_assignment(id, scope),
            NodeKind::UnaryMath => self.exec_unary_statement(id, scope),
            NodeKind::Call => self.exec_call(id, scope, ctx),
            NodeKind::Delay => {
                let ms = self.eval_int(self.child(id, 0, line)?, scope, "delay")?;
                if ms > 0 {
                    std::thread::sleep(Duration::from_millis(ms as u64));
                }
                Ok(())
            }
            NodeKind::Loop => self.exec_loop(id, scope, ctx),
            NodeKind::If => self.exec_if(id, scope, ctx),
            NodeKind::Expect => self.exec_expectation(id, scope, ctx, false),
            NodeKind::Assert => self.exec_expectation(id, scope, ctx, true),
            NodeKind::Print => {
                let value = self.eval(self.child(id, 0, line)?, scope)?;
                self.output.write(&value.to_string());
                Ok(())
            }
            NodeKind::Println => {
                let value = self.eval(self.child(id, 0, line)?, scope)?;
                self.output.writeln(&value.to_string());
                Ok(())
            }
            NodeKind::Prompt => {
                let value = self.eval(self.child(id, 0, line)?, scope)?;
                self.output.write(&value.to_string());
                self.devices
                    .console
                    .read_line()
                    .map_err(|e| RuntimeError::device(e, line))?;
                Ok(())
            }
            NodeKind::DigitalRead => {
                let pin = self.eval_int(self.child(id, 0, line)?, scope, "digital-read")?;
                let value = self
                    .devices
                    .gpio
                    .digital_read(pin)
                    .map_err(|e| RuntimeError::device(e, line))?;
                self.globals.set_retval(Object::Integer(value));
                Ok(())
            }
            NodeKind::AnalogRead => {
                let pin = self.eval_int(self.child(id, 0, line)?, scope, "analog-read")?;
                let value = self
                    .devices
                    .gpio
                    .analog_read(pin)
                    .map_err(|e| RuntimeError::device(e, line))?;
                self.globals.set_retval(Object::Integer(value));
                Ok(())
            }
            NodeKind::DigitalWrite => {
                let pin = self.eval_int(self.child(id, 0, line)?, scope, "digital-write")?;
                let value = self.eval_int(self.child(id, 1, line)?, scope, "digital-write")?;
                self.devices
                    .gpio
                    .digital_write(pin, value)
                    .map_err(|e| RuntimeError::device(e, line))
            }
            NodeKind::AnalogWrite => {
                let pin = self.eval_int(self.child(id, 0, line)?, scope, "analog-write")?;
                let value = self.eval_int(self.child(id, 1, line)?, scope, "analog-write")?;
                self.devices
                    .gpio
                    .analog_write(pin, value)
                    .map_err(|e| RuntimeError::device(e, line))
            }
            NodeKind::SerialTx => {
                let value = self.eval(self.child(id, 0, line)?, scope)?;
                self.devices
                    .serial
                    .tx_line(&value.to_string())
                    .map_err(|e| RuntimeError::device(e, line))
            }
            NodeKind::SerialRx => {
                let text = self
                    .devices
                    .serial
                    .rx_line()
                    .map_err(|e| RuntimeError::device(e, line))?;
                self.globals.set_retval(Object::String(text));
                Ok(())
            }
            NodeKind::SendMsg => self.exec_send_msg(id, scope),
            NodeKind::ReadMsg => self.exec_read_msg(id, scope),
            other => Err(RuntimeError::internal(
                format!("{} is not executable as a statement", other),
                line,
            )),
        }
    }

    /// Declaration-or-assignment. A plain target rebinds where the name
    /// resolves and also binds RETVAL; `msg[idx]`/`msg.length` mutate the
    /// bound message in place.
    fn exec_assignment(&mut self, id: NodeId, scope: ScopeRef) -> Result<(), RuntimeError> {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        let children = self.ast.children(id).to_vec();

        match children.as_slice() {
            [value_id] => {
                let value = self.eval(*value_id, scope)?;
                self.rebind(scope, &name, value.clone(), line)?;
                if name != reserved::RETVAL {
                    self.globals.set_retval(value);
                }
                Ok(())
            }
            [modifier_id, value_id] => {
                let value = self.eval_int(*value_id, scope, "message assignment")?;
                let modifier = self.ast.node(*modifier_id).kind;
                let index = match modifier {
                    NodeKind::Index => {
                        Some(self.eval_int(self.child(*modifier_id, 0, line)?, scope, "index")?)
                    }
                    NodeKind::Length => None,
                    other => {
                        return Err(RuntimeError::internal(
                            format!("{} is not a message access modifier", other),
                            line,
                        ))
                    }
                };

                let target = self.lookup_object_mut(scope, &name).ok_or_else(|| {
                    RuntimeError::internal(format!("unresolved identifier {}", name), line)
                })?;
                let Object::CanMessage(message) = target else {
                    return Err(RuntimeError::internal(
                        format!("{} is not a CAN message", name),
                        line,
                    ));
                };
                match index {
                    Some(idx) => message
                        .set_byte(idx, value)
                        .map_err(|e| RuntimeError::message(e, line))?,
                    None => message
                        .set_len(value)
                        .map_err(|e| RuntimeError::message(e, line))?,
                }
                self.globals.set_retval(Object::Integer(value));
                Ok(())
            }
            _ => Err(RuntimeError::internal("malformed assignment", line)),
        }
    }

    /// `x++` / `x--` in statement position mutates the binding
    fn exec_unary_statement(&mut self, id: NodeId, scope: ScopeRef) -> Result<(), RuntimeError> {
        let node = self.ast.node(id);
        let (line, text) = (node.line, node.text().to_string());
        let operand = self.child(id, 0, line)?;
        let operand_node = self.ast.node(operand);

        let mutates = matches!(
            MathOp::parse(&text),
            Some(MathOp::Increment) | Some(MathOp::Decrement)
        ) && operand_node.kind == NodeKind::Identifier
            && operand_node.children.is_empty();

        let result = self.eval(id, scope)?;
        if mutates {
            let name = self.ast.node(operand).text().to_string();
            self.rebind(scope, &name, result, line)?;
        }
        Ok(())
    }

    fn exec_call(
        &mut self,
        id: NodeId,
        _scope: ScopeRef,
        ctx: &mut ExecContext,
    ) -> Result<(), RuntimeError> {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text().to_string());
        if ctx.call_depth >= MAX_CALL_DEPTH {
            return Err(RuntimeError::CallDepthExceeded {
                depth: ctx.call_depth,
                line,
            });
        }
        let idx = self.routines.index_of(&name).ok_or_else(|| {
            RuntimeError::internal(format!("unresolved routine {}", name), line)
        })?;
        let body = self.routines.get(idx).body;

        // callee runs in its own scope; free names still reach the globals
        ctx.call_depth += 1;
        self.exec_list(body, ScopeRef::Routine(idx), ctx);
        ctx.call_depth -= 1;
        Ok(())
    }

    fn exec_loop(
        &mut self,
        id: NodeId,
        scope: ScopeRef,
        ctx: &mut ExecContext,
    ) -> Result<(), RuntimeError> {
        let line = self.ast.node(id).line;
        let cond = self.child(id, 0, line)?;
        let body = self.child(id, 1, line)?;
        let cond_node = self.ast.node(cond);

        if cond_node.kind == NodeKind::Forever {
            // terminates only through halt
            while !ctx.halt {
                self.exec_list(body, scope, ctx);
            }
            return Ok(());
        }

        // Pre-test iteration: the governing expression is re-evaluated
        // before each pass and its value decremented after each one. An
        // identifier condition decrements the binding itself; any other
        // expression decrements a private count seeded from one evaluation.
        if cond_node.kind == NodeKind::Identifier && cond_node.children.is_empty() {
            let name = cond_node.text().to_string();
            loop {
                if ctx.halt {
                    break;
                }
                let remaining = self.eval_int(cond, scope, "loop count")?;
                if remaining <= 0 {
                    break;
                }
                self.exec_list(body, scope, ctx);
                let current = self.eval_int(cond, scope, "loop count")?;
                self.rebind(scope, &name, Object::Integer(current - 1), line)?;
            }
        } else {
            let mut remaining = self.eval_int(cond, scope, "loop count")?;
            while remaining > 0 && !ctx.halt {
                self.exec_list(body, scope, ctx);
                remaining -= 1;
            }
        }
        Ok(())
    }

    fn exec_if(
        &mut self,
        id: NodeId,
        scope: ScopeRef,
        ctx: &mut ExecContext,
    ) -> Result<(), RuntimeError> {
        let line = self.ast.node(id).line;
        let cond = self.eval(self.child(id, 0, line)?, scope)?;
        if cond.is_truthy() {
            self.exec_list(self.child(id, 1, line)?, scope, ctx);
        } else if let Some(alt) = self.ast.child(id, 2) {
            let else_body = self.child(alt, 0, line)?;
            self.exec_list(else_body, scope, ctx);
        }
        Ok(())
    }

    fn exec_expectation(
        &mut self,
        id: NodeId,
        scope: ScopeRef,
        ctx: &mut ExecContext,
        is_assert: bool,
    ) -> Result<(), RuntimeError> {
        let line = self.ast.node(id).line;
        let outcome = self.eval(self.child(id, 0, line)?, scope)?;
        if outcome.is_truthy() {
            return Ok(());
        }

        if let Some(idx) = ctx.current_test {
            self.tests.get_mut(idx).mark_failed();
        }
        if is_assert {
            ctx.halt = true;
            log_error!(
                codes::runtime::ASSERTION_FAILED,
                "assertion failed; halting run",
                line = line
            );
        } else {
            log_warning!(code = codes::runtime::EXPECTATION_FAILED, "expectation failed",
                "line" => line
            );
        }
        Ok(())
    }

    fn exec_send_msg(&mut self, id: NodeId, scope: ScopeRef) -> Result<(), RuntimeError> {
        let line = self.ast.node(id).line;
        let msg_id = self.eval_int(self.child(id, 0, line)?, scope, "send-msg id")?;
        let payload = self.eval(self.child(id, 1, line)?, scope)?;
        let message = payload
            .as_message()
            .ok_or_else(|| RuntimeError::internal("send-msg payload is not a message", line))?;
        let frame = CanFrame::new(msg_id as u32, message.data());
        self.devices
            .can
            .send(&frame)
            .map_err(|e| RuntimeError::device(e, line))
    }

    /// Block until a frame with the requested id arrives, up to the read
    /// timeout; frames for other ids are discarded while waiting
    fn exec_read_msg(&mut self, id: NodeId, scope: ScopeRef) -> Result<(), RuntimeError> {
        let line = self.ast.node(id).line;
        let wanted = self.eval_int(self.child(id, 0, line)?, scope, "read-msg id")?;
        let deadline = Instant::now() + Duration::from_millis(CAN_READ_TIMEOUT_MS);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = self
                .devices
                .can
                .receive(remaining)
                .map_err(|e| RuntimeError::device(e, line))?;
            if frame.id == wanted as u32 {
                self.globals
                    .set_retval(Object::CanMessage(CanMessage::from_bytes(frame.data())));
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RuntimeError::device(
                    crate::devices::DeviceError::Timeout {
                        waited_ms: CAN_READ_TIMEOUT_MS,
                    },
                    line,
                ));
            }
        }
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn eval(&self, id: NodeId, scope: ScopeRef) -> Result<Object, RuntimeError> {
        let node = self.ast.node(id);
        let (kind, line) = (node.kind, node.line);
        match kind {
            NodeKind::IntegerLiteral | NodeKind::HexLiteral => Ok(Object::Integer(
                node.payload.as_int().unwrap_or_default(),
            )),
            NodeKind::StringLiteral => Ok(Object::String(node.text().to_string())),
            NodeKind::MessageLiteral => Ok(Object::CanMessage(CanMessage::parse(node.text()))),
            NodeKind::Identifier => self.eval_identifier(id, scope),
            NodeKind::BinaryMath => self.eval_binary_math(id, scope),
            NodeKind::UnaryMath => {
                let text = node.text().to_string();
                let operand = self.eval_int(self.child(id, 0, line)?, scope, "unary math")?;
                match MathOp::parse(&text) {
                    Some(MathOp::Increment) => Ok(Object::Integer(operand.wrapping_add(1))),
                    Some(MathOp::Decrement) => Ok(Object::Integer(operand.wrapping_sub(1))),
                    Some(MathOp::Sub) => Ok(Object::Integer(operand.wrapping_neg())),
                    Some(MathOp::Add) => Ok(Object::Integer(operand)),
                    _ => Err(RuntimeError::internal(
                        format!("bad unary operator {}", text),
                        line,
                    )),
                }
            }
            NodeKind::Comparison => self.eval_comparison(id, scope),
            NodeKind::And => {
                let lhs = self.eval(self.child(id, 0, line)?, scope)?;
                if !lhs.is_truthy() {
                    return Ok(Object::Integer(0));
                }
                let rhs = self.eval(self.child(id, 1, line)?, scope)?;
                Ok(Object::Integer(rhs.is_truthy() as i64))
            }
            NodeKind::Or => {
                let lhs = self.eval(self.child(id, 0, line)?, scope)?;
                if lhs.is_truthy() {
                    return Ok(Object::Integer(1));
                }
                let rhs = self.eval(self.child(id, 1, line)?, scope)?;
                Ok(Object::Integer(rhs.is_truthy() as i64))
            }
            other => Err(RuntimeError::internal(
                format!("{} is not an expression", other),
                line,
            )),
        }
    }

    fn eval_identifier(&self, id: NodeId, scope: ScopeRef) -> Result<Object, RuntimeError> {
        let node = self.ast.node(id);
        let (line, name) = (node.line, node.text());
        let value = self
            .lookup_object(scope, name)
            .ok_or_else(|| RuntimeError::internal(format!("unresolved identifier {}", name), line))?
            .clone();

        let Some(modifier) = self.ast.child(id, 0) else {
            return Ok(value);
        };
        let Object::CanMessage(message) = &value else {
            return Err(RuntimeError::internal(
                format!("{} is not a CAN message", name),
                line,
            ));
        };
        match self.ast.node(modifier).kind {
            NodeKind::Index => {
                let idx = self.eval_int(self.child(modifier, 0, line)?, scope, "index")?;
                let byte = message
                    .get(idx)
                    .map_err(|e| RuntimeError::message(e, line))?;
                Ok(Object::Integer(byte as i64))
            }
            NodeKind::Length => Ok(Object::Integer(message.len() as i64)),
            other => Err(RuntimeError::internal(
                format!("{} is not a message access modifier", other),
                line,
            )),
        }
    }

    fn eval_binary_math(&self, id: NodeId, scope: ScopeRef) -> Result<Object, RuntimeError> {
        let node = self.ast.node(id);
        let (line, text) = (node.line, node.text().to_string());
        let lhs = self.eval(self.child(id, 0, line)?, scope)?;
        let rhs = self.eval(self.child(id, 1, line)?, scope)?;
        let op = MathOp::parse(&text).ok_or_else(|| {
            RuntimeError::internal(format!("bad math operator {}", text), line)
        })?;

        // string concatenation through `+`; the checker guarantees every
        // other combination is integer/integer
        if op == MathOp::Add
            && (matches!(lhs, Object::String(_)) || matches!(rhs, Object::String(_)))
        {
            return Ok(Object::String(format!("{}{}", lhs, rhs)));
        }

        let (a, b) = match (lhs.as_int(), rhs.as_int()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(RuntimeError::internal(
                    format!("operator {} applied to non-integers", text),
                    line,
                ))
            }
        };
        match op {
            MathOp::Add => Ok(Object::Integer(a.wrapping_add(b))),
            MathOp::Sub => Ok(Object::Integer(a.wrapping_sub(b))),
            MathOp::Mul => Ok(Object::Integer(a.wrapping_mul(b))),
            MathOp::Div => {
                if b == 0 {
                    Err(RuntimeError::DivisionByZero { line })
                } else {
                    Ok(Object::Integer(a.wrapping_div(b)))
                }
            }
            MathOp::Increment | MathOp::Decrement => Err(RuntimeError::internal(
                format!("{} is not a binary operator", text),
                line,
            )),
        }
    }

    fn eval_comparison(&self, id: NodeId, scope: ScopeRef) -> Result<Object, RuntimeError> {
        let node = self.ast.node(id);
        let (line, text) = (node.line, node.text().to_string());
        let op = CompareOp::parse(&text).ok_or_else(|| {
            RuntimeError::internal(format!("bad comparison operator {}", text), line)
        })?;
        let lhs = self.eval(self.child(id, 0, line)?, scope)?;
        let rhs = self.eval(self.child(id, 1, line)?, scope)?;

        let truth = match op {
            CompareOp::Eq => values_equal(&lhs, &rhs),
            CompareOp::Ne => !values_equal(&lhs, &rhs),
            ordered => {
                let (a, b) = match (lhs.as_int(), rhs.as_int()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(RuntimeError::internal(
                            format!("{} applied to non-integers", text),
                            line,
                        ))
                    }
                };
                match ordered {
                    CompareOp::Gt => a > b,
                    CompareOp::Lt => a < b,
                    CompareOp::Ge => a >= b,
                    CompareOp::Le => a <= b,
                    _ => unreachable!(),
                }
            }
        };
        Ok(Object::Integer(truth as i64))
    }

    // ------------------------------------------------------------------
    // Scope plumbing
    // ------------------------------------------------------------------

    fn lookup_object(&self, scope: ScopeRef, name: &str) -> Option<&Object> {
        match scope {
            ScopeRef::Global => self.globals.lookup(name),
            ScopeRef::Routine(i) => self.routines.get(i).scope.lookup(name, self.globals),
            ScopeRef::Test(i) => self.tests.get(i).scope.lookup(name, self.globals),
        }
    }

    fn lookup_object_mut(&mut self, scope: ScopeRef, name: &str) -> Option<&mut Object> {
        match scope {
            ScopeRef::Global => self.globals.lookup_mut(name),
            ScopeRef::Routine(i) => {
                let def = self.routines.get_mut(i);
                if def.scope.contains_local(name) {
                    def.scope.lookup_local_mut(name)
                } else {
                    self.globals.lookup_mut(name)
                }
            }
            ScopeRef::Test(i) => {
                let def = self.tests.get_mut(i);
                if def.scope.contains_local(name) {
                    def.scope.lookup_local_mut(name)
                } else {
                    self.globals.lookup_mut(name)
                }
            }
        }
    }

    /// Rebind `name` where it resolves, without touching RETVAL
    fn rebind(
        &mut self,
        scope: ScopeRef,
        name: &str,
        value: Object,
        line: u32,
    ) -> Result<(), RuntimeError> {
        let result = match scope {
            ScopeRef::Global => {
                if name == reserved::RETVAL {
                    self.globals.set_retval(value);
                    Ok(())
                } else if self.globals.contains(name) {
                    self.globals.assign(name, value)
                } else {
                    self.globals.insert(name, value)
                }
            }
            ScopeRef::Routine(i) => {
                self.routines
                    .get_mut(i)
                    .scope
                    .assign(name, value, self.globals)
            }
            ScopeRef::Test(i) => self.tests.get_mut(i).scope.assign(name, value, self.globals),
        };
        result.map_err(|e| RuntimeError::internal(e.to_string(), line))
    }

    fn eval_int(
        &self,
        id: NodeId,
        scope: ScopeRef,
        context: &str,
    ) -> Result<i64, RuntimeError> {
        let line = self.ast.node(id).line;
        let value = self.eval(id, scope)?;
        value.as_int().ok_or_else(|| {
            RuntimeError::internal(format!("{} expects an integer", context), line)
        })
    }

    fn child(&self, parent: NodeId, n: usize, line: u32) -> Result<NodeId, RuntimeError> {
        self.ast
            .child(parent, n)
            .ok_or_else(|| RuntimeError::internal("missing child node", line))
    }

    fn trace_statement(&self, id: NodeId) {
        let verbose = self
            .globals
            .lookup(reserved::VERBOSE)
            .map(Object::is_truthy)
            .unwrap_or(false);
        if verbose {
            let node = self.ast.node(id);
            log_debug!("statement", line = node.line, "kind" => node.kind);
        }
    }
}

/// EQ/NE semantics: same-type values compare for equality; a message and an
/// integer compare the message's logical length
fn values_equal(lhs: &Object, rhs: &Object) -> bool {
    match (lhs, rhs) {
        (Object::CanMessage(m), Object::Integer(n))
        | (Object::Integer(n), Object::CanMessage(m)) => m.len() as i64 == *n,
        (a, b) => a == b,
    }
}

fn report_runtime_error(err: &RuntimeError) {
    log_error!(err.code(), &err.to_string(), line = err.line());
}
