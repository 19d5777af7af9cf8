//! Analyze-then-run pipeline
//!
//! The front door of the engine: [`analyze`] turns a parse handoff into a
//! validated [`Program`], and a `Program` exposes the three run entry points
//! (all tests, one named test, one named routine). A script with parse
//! errors or any static diagnostic is never executed.

use crate::ast::{Ast, NodeId, ParseOutcome};
use crate::devices::Devices;
use crate::interp::{Interpreter, OutputSink};
use crate::semantics::{CheckError, Checker, Diagnostics};
use crate::symbols::{GlobalScope, Routines, TestState, Tests};
use crate::logging::codes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("test \"{0}\" is not defined")]
    UnknownTest(String),

    #[error("routine \"{0}\" is not defined")]
    UnknownRoutine(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Validate a parse handoff into an executable program.
///
/// Every static defect is reported through the logger and returned; the
/// caller decides whether to print, count, or serialize them.
pub fn analyze(outcome: ParseOutcome) -> Result<Program, Diagnostics> {
    if !outcome.is_usable() {
        let mut diags = Diagnostics::new();
        diags.push(CheckError::UnusableParse {
            errors: outcome.errors,
        });
        diags.report();
        return Err(diags);
    }

    let checked = Checker::check(&outcome.ast, outcome.root);
    if !checked.is_well_typed() {
        checked.diagnostics.report();
        return Err(checked.diagnostics);
    }

    log_info!(code = codes::info::ANALYSIS_COMPLETE, "analysis complete",
        "routines" => checked.routines.len(),
        "tests" => checked.tests.len()
    );
    Ok(Program {
        ast: outcome.ast,
        routines: checked.routines,
        tests: checked.tests,
        globals: checked.globals,
        global_decls: checked.global_decls,
    })
}

/// A validated program: the tree, the populated registries, and the global
/// scope, ready to run any number of times
#[derive(Debug)]
pub struct Program {
    ast: Ast,
    routines: Routines,
    tests: Tests,
    globals: GlobalScope,
    global_decls: Vec<NodeId>,
}

impl Program {
    pub fn tests(&self) -> &Tests {
        &self.tests
    }

    pub fn routines(&self) -> &Routines {
        &self.routines
    }

    pub fn globals(&self) -> &GlobalScope {
        &self.globals
    }

    /// Run every test in definition order
    pub fn run_all_tests(
        &mut self,
        devices: &mut Devices,
        output: &mut dyn OutputSink,
    ) -> RunReport {
        let started_at = Utc::now();
        {
            let mut interp = Interpreter::new(
                &self.ast,
                &mut self.routines,
                &mut self.tests,
                &mut self.globals,
                devices,
                output,
            );
            interp.init_globals(&self.global_decls);
            interp.run_all_tests();
        }
        let report = RunReport::collect(started_at, self.tests.iter());
        log_info!(code = codes::info::RUN_COMPLETE, "run complete",
            "passed" => report.passed,
            "failed" => report.failed
        );
        report
    }

    /// Run one named test
    pub fn run_test(
        &mut self,
        name: &str,
        devices: &mut Devices,
        output: &mut dyn OutputSink,
    ) -> Result<RunReport, PipelineError> {
        let Some(idx) = self.tests.index_of(name) else {
            return Err(PipelineError::UnknownTest(name.to_string()));
        };
        let started_at = Utc::now();
        {
            let mut interp = Interpreter::new(
                &self.ast,
                &mut self.routines,
                &mut self.tests,
                &mut self.globals,
                devices,
                output,
            );
            interp.init_globals(&self.global_decls);
            let _ = interp.run_test(name);
        }
        Ok(RunReport::collect(
            started_at,
            std::iter::once(self.tests.get(idx)),
        ))
    }

    /// Run several named tests in the order given, under one report
    pub fn run_tests(
        &mut self,
        names: &[String],
        devices: &mut Devices,
        output: &mut dyn OutputSink,
    ) -> Result<RunReport, PipelineError> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .tests
                .index_of(name)
                .ok_or_else(|| PipelineError::UnknownTest(name.clone()))?;
            indices.push(idx);
        }
        let started_at = Utc::now();
        {
            let mut interp = Interpreter::new(
                &self.ast,
                &mut self.routines,
                &mut self.tests,
                &mut self.globals,
                devices,
                output,
            );
            interp.init_globals(&self.global_decls);
            for name in names {
                let _ = interp.run_test(name);
            }
        }
        Ok(RunReport::collect(
            started_at,
            indices.into_iter().map(|i| self.tests.get(i)),
        ))
    }

    /// Run one named routine; routines carry no pass/fail state
    pub fn run_routine(
        &mut self,
        name: &str,
        devices: &mut Devices,
        output: &mut dyn OutputSink,
    ) -> Result<(), PipelineError> {
        if !self.routines.contains(name) {
            return Err(PipelineError::UnknownRoutine(name.to_string()));
        }
        let mut interp = Interpreter::new(
            &self.ast,
            &mut self.routines,
            &mut self.tests,
            &mut self.globals,
            devices,
            output,
        );
        interp.init_globals(&self.global_decls);
        let _ = interp.run_routine(name);
        Ok(())
    }
}

/// Outcome of a single test
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    pub state: TestState,
}

/// What one run produced, serializable for `--report-json`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
}

impl RunReport {
    fn collect<'a>(
        started_at: DateTime<Utc>,
        tests: impl Iterator<Item = &'a crate::symbols::TestDef>,
    ) -> Self {
        let results: Vec<TestResult> = tests
            .map(|def| TestResult {
                name: def.name.clone(),
                state: def.state(),
            })
            .collect();
        let passed = results
            .iter()
            .filter(|r| r.state == TestState::Passed)
            .count();
        let failed = results
            .iter()
            .filter(|r| r.state == TestState::Failed)
            .count();
        Self {
            started_at,
            finished_at: Utc::now(),
            results,
            passed,
            failed,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unusable_parse_is_rejected() {
        let mut outcome = ParseOutcome::new(Ast::new(), NodeId(0));
        outcome.errors = 3;
        let diags = analyze(outcome).unwrap_err();
        assert!(diags
            .iter()
            .any(|e| matches!(e, CheckError::UnusableParse { errors: 3 })));
    }
}
