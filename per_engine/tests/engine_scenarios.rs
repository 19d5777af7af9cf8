//! End-to-end runs of small programs through analyze + the evaluator,
//! against the loopback device complement.

use per_engine::ast::{Ast, Node, NodeId, NodeKind, ParseOutcome, Payload};
use per_engine::devices::Devices;
use per_engine::interp::CaptureSink;
use per_engine::object::Object;
use per_engine::pipeline::{analyze, PipelineError};
use per_engine::semantics::CheckError;
use per_engine::TestState;

/// Builds program trees the way the grammar front end would
struct ScriptBuilder {
    ast: Ast,
    globals: Vec<NodeId>,
    routines: Vec<NodeId>,
    tests: Vec<NodeId>,
}

impl ScriptBuilder {
    fn new() -> Self {
        Self {
            ast: Ast::new(),
            globals: Vec::new(),
            routines: Vec::new(),
            tests: Vec::new(),
        }
    }

    fn node(&mut self, kind: NodeKind, line: u32, payload: Payload, children: Vec<NodeId>) -> NodeId {
        let mut node = Node::new(kind, line);
        node.payload = payload;
        self.ast.add_with_children(node, children)
    }

    fn int(&mut self, line: u32, value: i64) -> NodeId {
        self.node(NodeKind::IntegerLiteral, line, Payload::Int(value), vec![])
    }

    fn string(&mut self, line: u32, value: &str) -> NodeId {
        self.node(NodeKind::StringLiteral, line, Payload::Str(value.into()), vec![])
    }

    fn message(&mut self, line: u32, literal: &str) -> NodeId {
        self.node(
            NodeKind::MessageLiteral,
            line,
            Payload::Str(literal.into()),
            vec![],
        )
    }

    fn ident(&mut self, line: u32, name: &str) -> NodeId {
        self.node(NodeKind::Identifier, line, Payload::Str(name.into()), vec![])
    }

    fn math(&mut self, line: u32, op: &str, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.node(
            NodeKind::BinaryMath,
            line,
            Payload::Str(op.into()),
            vec![lhs, rhs],
        )
    }

    fn assign(&mut self, line: u32, name: &str, value: NodeId) -> NodeId {
        self.node(NodeKind::VarDecl, line, Payload::Str(name.into()), vec![value])
    }

    /// `expect <op> <operand>`, desugared against RETVAL like the front end
    fn expectation(&mut self, line: u32, kind: NodeKind, op: &str, operand: NodeId) -> NodeId {
        let retval = self.ident(line, "RETVAL");
        let cmp = self.node(
            NodeKind::Comparison,
            line,
            Payload::Str(op.into()),
            vec![retval, operand],
        );
        self.node(kind, line, Payload::None, vec![cmp])
    }

    fn println(&mut self, line: u32, text: &str) -> NodeId {
        let arg = self.string(line, text);
        self.node(NodeKind::Println, line, Payload::None, vec![arg])
    }

    fn statements(&mut self, line: u32, stmts: Vec<NodeId>) -> NodeId {
        self.node(NodeKind::StatementList, line, Payload::None, stmts)
    }

    fn global(&mut self, line: u32, name: &str, value: NodeId) {
        let decl = self.assign(line, name, value);
        self.globals.push(decl);
    }

    fn routine(&mut self, line: u32, name: &str, body: NodeId) {
        let decl = self.node(NodeKind::Routine, line, Payload::Str(name.into()), vec![body]);
        self.routines.push(decl);
    }

    fn test(&mut self, line: u32, name: &str, body: NodeId) {
        let decl = self.node(NodeKind::Test, line, Payload::Str(name.into()), vec![body]);
        self.tests.push(decl);
    }

    fn finish(mut self) -> ParseOutcome {
        let mut root_children = Vec::new();
        if !self.globals.is_empty() {
            let globals = self.globals.clone();
            root_children.push(self.node(NodeKind::VarDeclList, 0, Payload::None, globals));
        }
        if !self.routines.is_empty() {
            let routines = self.routines.clone();
            root_children.push(self.node(NodeKind::RoutineList, 0, Payload::None, routines));
        }
        if !self.tests.is_empty() {
            let tests = self.tests.clone();
            root_children.push(self.node(NodeKind::TestList, 0, Payload::None, tests));
        }
        let root = self.node(NodeKind::StatementList, 0, Payload::None, root_children);
        ParseOutcome::new(self.ast, root)
    }
}

#[test]
fn global_increment_with_expect_passes() {
    // global COUNT = 0;
    // test "t1" { COUNT = COUNT + 1; expect EQ 1; }
    let mut b = ScriptBuilder::new();
    let zero = b.int(1, 0);
    b.global(1, "COUNT", zero);

    let count = b.ident(4, "COUNT");
    let one = b.int(4, 1);
    let sum = b.math(4, "+", count, one);
    let bump = b.assign(4, "COUNT", sum);
    let expected = b.int(5, 1);
    let expect = b.expectation(5, NodeKind::Expect, "EQ", expected);
    let body = b.statements(3, vec![bump, expect]);
    b.test(3, "t1", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.passed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.results[0].state, TestState::Passed);
    assert_eq!(program.globals().lookup("COUNT"), Some(&Object::Integer(1)));
}

#[test]
fn can_round_trip_assert_on_length_passes() {
    // send-msg(0x10, "1|2|3"); read-msg(0x10); assert EQ 3;
    let mut b = ScriptBuilder::new();
    let id = b.int(2, 0x10);
    let payload = b.message(2, "1|2|3");
    let send = b.node(NodeKind::SendMsg, 2, Payload::None, vec![id, payload]);
    let id2 = b.int(3, 0x10);
    let read = b.node(NodeKind::ReadMsg, 3, Payload::None, vec![id2]);
    let three = b.int(4, 3);
    let assert_stmt = b.expectation(4, NodeKind::Assert, "EQ", three);
    let body = b.statements(1, vec![send, read, assert_stmt]);
    b.test(1, "bus", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
}

#[test]
fn invalid_message_literal_is_a_static_error() {
    // 999 does not fit a byte, so the script must be rejected before any run
    let mut b = ScriptBuilder::new();
    let bad = b.message(1, "1|999|3");
    b.global(1, "MSG", bad);

    let diags = analyze(b.finish()).unwrap_err();
    assert!(diags
        .iter()
        .any(|e| matches!(e, CheckError::InvalidMessageLiteral { .. })));
}

#[test]
fn counted_loop_runs_exactly_n_times() {
    // loop (5) { println "hi"; }
    let mut b = ScriptBuilder::new();
    let five = b.int(2, 5);
    let hi = b.println(3, "hi");
    let body = b.statements(2, vec![hi]);
    let lp = b.node(NodeKind::Loop, 2, Payload::None, vec![five, body]);
    let test_body = b.statements(1, vec![lp]);
    b.test(1, "loops", test_body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    program.run_all_tests(&mut devices, &mut output);

    assert_eq!(output.lines(), vec!["hi"; 5]);
}

#[test]
fn identifier_loop_decrements_the_binding() {
    // global N = 3; loop (N) { println "tick"; }
    let mut b = ScriptBuilder::new();
    let three = b.int(1, 3);
    b.global(1, "N", three);

    let n = b.ident(3, "N");
    let tick = b.println(4, "tick");
    let body = b.statements(3, vec![tick]);
    let lp = b.node(NodeKind::Loop, 3, Payload::None, vec![n, body]);
    let test_body = b.statements(2, vec![lp]);
    b.test(2, "count-down", test_body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    program.run_all_tests(&mut devices, &mut output);

    assert_eq!(output.lines().len(), 3);
    assert_eq!(program.globals().lookup("N"), Some(&Object::Integer(0)));
}

#[test]
fn empty_test_passes() {
    let mut b = ScriptBuilder::new();
    let body = b.statements(1, vec![]);
    b.test(1, "empty", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
}

#[test]
fn failed_expect_continues_and_test_fails() {
    // X = 1; expect EQ 2; println "after";
    let mut b = ScriptBuilder::new();
    let one = b.int(2, 1);
    let set = b.assign(2, "X", one);
    let two = b.int(3, 2);
    let expect = b.expectation(3, NodeKind::Expect, "EQ", two);
    let after = b.println(4, "after");
    let body = b.statements(1, vec![set, expect, after]);
    b.test(1, "t1", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Failed);
    assert_eq!(output.lines(), vec!["after"]);
}

#[test]
fn failed_assert_halts_current_test_but_not_the_next() {
    // test "t1" { X = 1; assert EQ 2; println "unreached"; }
    // test "t2" { println "second"; }
    let mut b = ScriptBuilder::new();
    let one = b.int(2, 1);
    let set = b.assign(2, "X", one);
    let two = b.int(3, 2);
    let assert_stmt = b.expectation(3, NodeKind::Assert, "EQ", two);
    let unreached = b.println(4, "unreached");
    let body1 = b.statements(1, vec![set, assert_stmt, unreached]);
    b.test(1, "t1", body1);

    let second = b.println(7, "second");
    let body2 = b.statements(6, vec![second]);
    b.test(6, "t2", body2);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Failed);
    assert_eq!(report.results[1].state, TestState::Passed);
    assert_eq!(output.lines(), vec!["second"]);
}

#[test]
fn routine_call_mutates_shared_global() {
    // global COUNT = 0;
    // routine "bump" { COUNT = COUNT + 1; }
    // test "t1" { call "bump"; call "bump"; expect EQ 2; }
    let mut b = ScriptBuilder::new();
    let zero = b.int(1, 0);
    b.global(1, "COUNT", zero);

    let count = b.ident(4, "COUNT");
    let one = b.int(4, 1);
    let sum = b.math(4, "+", count, one);
    let bump = b.assign(4, "COUNT", sum);
    let routine_body = b.statements(3, vec![bump]);
    b.routine(3, "bump", routine_body);

    let call1 = b.node(NodeKind::Call, 8, Payload::Str("bump".into()), vec![]);
    let call2 = b.node(NodeKind::Call, 9, Payload::Str("bump".into()), vec![]);
    let expected = b.int(10, 2);
    let expect = b.expectation(10, NodeKind::Expect, "EQ", expected);
    let test_body = b.statements(7, vec![call1, call2, expect]);
    b.test(7, "t1", test_body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
    assert_eq!(program.globals().lookup("COUNT"), Some(&Object::Integer(2)));
}

#[test]
fn unknown_test_name_is_rejected() {
    let mut b = ScriptBuilder::new();
    let body = b.statements(1, vec![]);
    b.test(1, "t1", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let err = program
        .run_test("missing", &mut devices, &mut output)
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownTest(name) if name == "missing"));
}

#[test]
fn run_single_named_test_reports_only_it() {
    let mut b = ScriptBuilder::new();
    let body_a = b.statements(1, vec![]);
    b.test(1, "a", body_a);
    let shout = b.println(4, "b ran");
    let body_b = b.statements(3, vec![shout]);
    b.test(3, "b", body_b);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_test("b", &mut devices, &mut output).unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].name, "b");
    assert_eq!(report.results[0].state, TestState::Passed);
    assert_eq!(output.lines(), vec!["b ran"]);
}

#[test]
fn message_byte_access_and_in_place_mutation() {
    // global MSG = "1|2|3";
    // test { MSG[1] = 9; X = MSG[1]; expect EQ 9; }
    let mut b = ScriptBuilder::new();
    let literal = b.message(1, "1|2|3");
    b.global(1, "MSG", literal);

    let idx = b.int(3, 1);
    let index_mod = b.node(NodeKind::Index, 3, Payload::None, vec![idx]);
    let nine = b.int(3, 9);
    let set_byte = b.node(
        NodeKind::VarDecl,
        3,
        Payload::Str("MSG".into()),
        vec![index_mod, nine],
    );

    let idx2 = b.int(4, 1);
    let index_mod2 = b.node(NodeKind::Index, 4, Payload::None, vec![idx2]);
    let read = b.node(
        NodeKind::Identifier,
        4,
        Payload::Str("MSG".into()),
        vec![index_mod2],
    );
    let store = b.assign(4, "X", read);

    let expected = b.int(5, 9);
    let expect = b.expectation(5, NodeKind::Expect, "EQ", expected);
    let body = b.statements(2, vec![set_byte, store, expect]);
    b.test(2, "bytes", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
}

#[test]
fn out_of_range_index_does_not_abort_the_test() {
    // MSG[7] = 1 is out of range for a 3-byte message; the statement is
    // abandoned but the rest of the test still runs
    let mut b = ScriptBuilder::new();
    let literal = b.message(1, "1|2|3");
    b.global(1, "MSG", literal);

    let idx = b.int(3, 7);
    let index_mod = b.node(NodeKind::Index, 3, Payload::None, vec![idx]);
    let one = b.int(3, 1);
    let bad_write = b.node(
        NodeKind::VarDecl,
        3,
        Payload::Str("MSG".into()),
        vec![index_mod, one],
    );
    let after = b.println(4, "still here");
    let body = b.statements(2, vec![bad_write, after]);
    b.test(2, "resilient", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
    assert_eq!(output.lines(), vec!["still here"]);
}

#[test]
fn gpio_read_binds_retval() {
    // digital-read(4) with pin 4 unset reads 0; expect EQ 0
    let mut b = ScriptBuilder::new();
    let pin = b.int(2, 4);
    let read = b.node(NodeKind::DigitalRead, 2, Payload::None, vec![pin]);
    let zero = b.int(3, 0);
    let expect = b.expectation(3, NodeKind::Expect, "EQ", zero);
    let body = b.statements(1, vec![read, expect]);
    b.test(1, "gpio", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
}

#[test]
fn serial_rx_binds_retval_to_string() {
    // serial-rx; expect EQ "" (the null serial device answers empty lines)
    let mut b = ScriptBuilder::new();
    let rx = b.node(NodeKind::SerialRx, 2, Payload::None, vec![]);
    let empty = b.string(3, "");
    let expect = b.expectation(3, NodeKind::Expect, "EQ", empty);
    let body = b.statements(1, vec![rx, expect]);
    b.test(1, "serial", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    assert_eq!(report.results[0].state, TestState::Passed);
}

#[test]
fn report_serializes_to_json() {
    let mut b = ScriptBuilder::new();
    let body = b.statements(1, vec![]);
    b.test(1, "t1", body);

    let mut program = analyze(b.finish()).expect("well-typed");
    let mut devices = Devices::loopback();
    let mut output = CaptureSink::new();
    let report = program.run_all_tests(&mut devices, &mut output);

    let json = report.to_json().unwrap();
    assert!(json.contains("\"t1\""));
    assert!(json.contains("Passed"));
}
