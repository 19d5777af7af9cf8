//! PER language engine
//!
//! A miniature compiler front end plus interpreter for the PER scripting
//! language, which drives automated hardware test sequences over a CAN bus.
//! The out-of-tree grammar front end hands this crate a finished tree
//! ([`ast::ParseOutcome`]); [`pipeline::analyze`] type-checks it into a
//! [`pipeline::Program`], which runs tests and routines against the device
//! collaborators in [`devices`].

// Internal modules
pub mod ast;
pub mod config;
pub mod devices;
pub mod interp;
#[macro_use]
pub mod logging;
pub mod object;
pub mod pipeline;
pub mod semantics;
pub mod symbols;
pub mod template;

// Re-export key types for library consumers
pub use pipeline::{analyze, PipelineError, Program, RunReport, TestResult};
pub use semantics::{CheckError, Diagnostics};
pub use symbols::TestState;
