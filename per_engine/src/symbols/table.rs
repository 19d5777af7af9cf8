//! Scope tables for the PER language
//!
//! One global scope per program, pre-seeded with the reserved keys; one
//! local table per routine/test. A local lookup that misses falls back to
//! the global scope. Fallback is expressed by passing the global scope into
//! every lookup/assign call instead of storing a back-reference, so scope
//! lifetimes stay independent.

use crate::config::reserved;
use crate::object::{Object, ObjectType};
use crate::symbols::SymbolError;
use std::collections::HashMap;

/// The single program-wide scope. Owns the reserved keys from construction.
#[derive(Debug, Clone)]
pub struct GlobalScope {
    bindings: HashMap<String, Object>,
}

impl Default for GlobalScope {
    fn default() -> Self {
        let mut bindings = HashMap::new();
        for (name, ty) in reserved::RESERVED_GLOBALS {
            bindings.insert(name.to_string(), Object::default_of(ty));
        }
        Self { bindings }
    }
}

impl GlobalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn lookup(&self, name: &str) -> Option<&Object> {
        self.bindings.get(name)
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Object> {
        self.bindings.get_mut(name)
    }

    /// Bind a new global name. Fails on re-declaration.
    pub fn insert(&mut self, name: &str, value: Object) -> Result<(), SymbolError> {
        if self.bindings.contains_key(name) {
            return Err(SymbolError::duplicate("global", name, 0));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Replace an existing binding. Reserved keys other than RETVAL keep
    /// their fixed type; violating that is a checked invariant, not a
    /// convention.
    pub fn assign(&mut self, name: &str, value: Object) -> Result<(), SymbolError> {
        if let Some(expected) = reserved::fixed_type(name) {
            if value.type_tag() != expected {
                return Err(SymbolError::reserved_type_violation(
                    name,
                    expected,
                    value.type_tag(),
                ));
            }
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Shorthand for binding the RETVAL reserved key, whose type changes
    /// freely
    pub fn set_retval(&mut self, value: Object) {
        self.bindings.insert(reserved::RETVAL.to_string(), value);
    }

    pub fn retval(&self) -> &Object {
        // seeded at construction and never removed
        self.bindings
            .get(reserved::RETVAL)
            .expect("RETVAL missing from global scope")
    }
}

/// Whether a local table belongs to a routine or a test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Routine,
    Test,
}

/// A routine- or test-local table. Holds only local bindings; global
/// fallback happens in [`ScopeTable::lookup`]/[`ScopeTable::assign`].
#[derive(Debug, Clone)]
pub struct ScopeTable {
    kind: ScopeKind,
    bindings: HashMap<String, Object>,
}

impl ScopeTable {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: HashMap::new(),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Local mapping first, then the global scope
    pub fn lookup<'a>(&'a self, name: &str, globals: &'a GlobalScope) -> Option<&'a Object> {
        self.bindings.get(name).or_else(|| globals.lookup(name))
    }

    pub fn lookup_local_mut(&mut self, name: &str) -> Option<&mut Object> {
        self.bindings.get_mut(name)
    }

    /// Bind a new local name. Fails on re-declaration in this scope.
    pub fn insert(&mut self, name: &str, value: Object) -> Result<(), SymbolError> {
        if self.bindings.contains_key(name) {
            return Err(SymbolError::duplicate("variable", name, 0));
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Rebind `name` where it resolves: the local mapping first, then the
    /// global scope, else a fresh local binding. Global mutation from a
    /// local scope is immediately visible everywhere.
    pub fn assign(
        &mut self,
        name: &str,
        value: Object,
        globals: &mut GlobalScope,
    ) -> Result<(), SymbolError> {
        if self.bindings.contains_key(name) {
            self.bindings.insert(name.to_string(), value);
            return Ok(());
        }
        if globals.contains(name) {
            return globals.assign(name, value);
        }
        self.bindings.insert(name.to_string(), value);
        Ok(())
    }

    /// Static type of `name` as currently bound, with global fallback
    pub fn object_type(&self, name: &str, globals: &GlobalScope) -> Option<ObjectType> {
        self.lookup(name, globals).map(Object::type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_global_scope_is_preseeded() {
        let globals = GlobalScope::new();
        assert_eq!(globals.lookup("VERBOSE"), Some(&Object::Integer(0)));
        assert_eq!(globals.lookup("RETVAL"), Some(&Object::None));
        assert_eq!(
            globals.lookup("SERIAL_DEVICE"),
            Some(&Object::String(String::new()))
        );
        assert_eq!(globals.lookup("COUNT"), None);
    }

    #[test]
    fn test_lookup_after_bind_in_same_scope() {
        let globals = GlobalScope::new();
        let mut scope = ScopeTable::new(ScopeKind::Routine);
        scope.insert("x", Object::Integer(9)).unwrap();
        assert_eq!(scope.lookup("x", &globals), Some(&Object::Integer(9)));
    }

    #[test]
    fn test_lookup_falls_through_to_globals() {
        let mut globals = GlobalScope::new();
        globals.insert("COUNT", Object::Integer(0)).unwrap();
        let mut scope = ScopeTable::new(ScopeKind::Test);
        scope.insert("local", Object::Integer(1)).unwrap();

        assert_eq!(scope.lookup("COUNT", &globals), Some(&Object::Integer(0)));
        assert_eq!(scope.lookup("missing", &globals), None);
    }

    #[test]
    fn test_assign_updates_global_binding() {
        let mut globals = GlobalScope::new();
        globals.insert("COUNT", Object::Integer(0)).unwrap();
        let mut scope = ScopeTable::new(ScopeKind::Test);

        scope
            .assign("COUNT", Object::Integer(1), &mut globals)
            .unwrap();
        assert_eq!(globals.lookup("COUNT"), Some(&Object::Integer(1)));
        assert!(!scope.contains_local("COUNT"));
    }

    #[test]
    fn test_assign_unbound_name_binds_locally() {
        let mut globals = GlobalScope::new();
        let mut scope = ScopeTable::new(ScopeKind::Routine);

        scope
            .assign("fresh", Object::String("v".into()), &mut globals)
            .unwrap();
        assert!(scope.contains_local("fresh"));
        assert!(!globals.contains("fresh"));
    }

    #[test]
    fn test_duplicate_local_insert_is_rejected() {
        let mut scope = ScopeTable::new(ScopeKind::Routine);
        scope.insert("x", Object::Integer(1)).unwrap();
        assert_matches!(
            scope.insert("x", Object::Integer(2)),
            Err(SymbolError::DuplicateDefinition { .. })
        );
    }

    #[test]
    fn test_reserved_global_keeps_its_type() {
        let mut globals = GlobalScope::new();
        assert_matches!(
            globals.assign("VERBOSE", Object::String("loud".into())),
            Err(SymbolError::ReservedTypeViolation { .. })
        );
        assert!(globals.assign("VERBOSE", Object::Integer(1)).is_ok());
    }

    #[test]
    fn test_retval_retypes_freely() {
        let mut globals = GlobalScope::new();
        globals.set_retval(Object::Integer(3));
        assert_eq!(globals.retval(), &Object::Integer(3));
        globals.set_retval(Object::String("line".into()));
        assert_eq!(globals.retval(), &Object::String("line".into()));
    }
}
