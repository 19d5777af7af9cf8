//! Symbol tables, scopes, and routine/test registries

pub mod error;
pub mod registry;
pub mod table;

pub use error::SymbolError;
pub use registry::{RoutineDef, Routines, TestDef, TestState, Tests};
pub use table::{GlobalScope, ScopeKind, ScopeTable};
