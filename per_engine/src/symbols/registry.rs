//! Routine and test registries
//!
//! Built by the type checker, read and mutated (scope contents, test state)
//! by the evaluator, discarded together when a script is re-analyzed.

use crate::ast::NodeId;
use crate::symbols::{ScopeKind, ScopeTable, SymbolError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pass/fail lifecycle of one test for one run. `Failed` is one-way: once a
/// test fails it stays failed for that run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestState {
    NotRun,
    Running,
    Passed,
    Failed,
}

impl TestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRun => "not-run",
            Self::Running => "running",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

/// A named, callable subprogram with its own scope
#[derive(Debug, Clone)]
pub struct RoutineDef {
    pub name: String,
    pub line: u32,
    /// The statement-list body inside the program AST
    pub body: NodeId,
    pub scope: ScopeTable,
}

/// A named test with pass/fail tracking; not callable
#[derive(Debug, Clone)]
pub struct TestDef {
    pub name: String,
    pub line: u32,
    pub body: NodeId,
    pub scope: ScopeTable,
    state: TestState,
}

impl TestDef {
    pub fn state(&self) -> TestState {
        self.state
    }

    /// Move from NotRun to Running at the top of a run
    pub fn begin_run(&mut self) {
        if self.state == TestState::NotRun {
            self.state = TestState::Running;
        }
    }

    /// One-way transition to Failed
    pub fn mark_failed(&mut self) {
        self.state = TestState::Failed;
    }

    /// Terminal transition when the body finished with no failed
    /// expectation. A test already failed stays failed.
    pub fn finish_run(&mut self) {
        if self.state == TestState::Running {
            self.state = TestState::Passed;
        }
    }

    /// Reset to NotRun for a fresh run of the same program
    pub fn reset(&mut self) {
        self.state = TestState::NotRun;
    }
}

/// Name-to-definition registry for routines
#[derive(Debug, Clone, Default)]
pub struct Routines {
    defs: Vec<RoutineDef>,
    index: HashMap<String, usize>,
}

impl Routines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a routine; duplicate declaration is an error, not a silent
    /// overwrite
    pub fn add(&mut self, name: &str, line: u32, body: NodeId) -> Result<usize, SymbolError> {
        if let Some(&existing) = self.index.get(name) {
            return Err(SymbolError::duplicate(
                "routine",
                name,
                self.defs[existing].line,
            ));
        }
        let idx = self.defs.len();
        self.defs.push(RoutineDef {
            name: name.to_string(),
            line,
            body,
            scope: ScopeTable::new(ScopeKind::Routine),
        });
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, idx: usize) -> &RoutineDef {
        &self.defs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut RoutineDef {
        &mut self.defs[idx]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Name-to-definition registry for tests
#[derive(Debug, Clone, Default)]
pub struct Tests {
    defs: Vec<TestDef>,
    index: HashMap<String, usize>,
}

impl Tests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: &str, line: u32, body: NodeId) -> Result<usize, SymbolError> {
        if let Some(&existing) = self.index.get(name) {
            return Err(SymbolError::duplicate(
                "test",
                name,
                self.defs[existing].line,
            ));
        }
        let idx = self.defs.len();
        self.defs.push(TestDef {
            name: name.to_string(),
            line,
            body,
            scope: ScopeTable::new(ScopeKind::Test),
            state: TestState::NotRun,
        });
        self.index.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, idx: usize) -> &TestDef {
        &self.defs[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut TestDef {
        &mut self.defs[idx]
    }

    /// Definition order, which is source order
    pub fn iter(&self) -> impl Iterator<Item = &TestDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn body() -> NodeId {
        NodeId(0)
    }

    #[test]
    fn test_duplicate_routine_is_rejected() {
        let mut routines = Routines::new();
        routines.add("setup", 3, body()).unwrap();
        assert_matches!(
            routines.add("setup", 9, body()),
            Err(SymbolError::DuplicateDefinition {
                kind: "routine",
                previous_line: 3,
                ..
            })
        );
    }

    #[test]
    fn test_duplicate_test_is_rejected() {
        let mut tests = Tests::new();
        tests.add("t1", 1, body()).unwrap();
        assert_matches!(
            tests.add("t1", 4, body()),
            Err(SymbolError::DuplicateDefinition { kind: "test", .. })
        );
    }

    #[test]
    fn test_failure_is_one_way() {
        let mut tests = Tests::new();
        let idx = tests.add("t1", 1, body()).unwrap();
        let def = tests.get_mut(idx);

        def.begin_run();
        assert_eq!(def.state(), TestState::Running);
        def.mark_failed();
        def.finish_run();
        assert_eq!(def.state(), TestState::Failed);
    }

    #[test]
    fn test_clean_run_passes() {
        let mut tests = Tests::new();
        let idx = tests.add("t1", 1, body()).unwrap();
        let def = tests.get_mut(idx);

        def.begin_run();
        def.finish_run();
        assert_eq!(def.state(), TestState::Passed);
    }
}
