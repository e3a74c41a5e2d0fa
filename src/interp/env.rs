//! Runtime scope stack (spec §4.5), grounded in
//! `examples/original_source/core/runtime/interpreter/runtime_context.py`
//! (`ScopeImpl`/`RuntimeContextImpl`).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::diagnostics::Code;
use crate::intern::Symbol;
use crate::interp::value::Value;
use crate::interp::RuntimeError;
use crate::token::Span;

struct Binding<'a> {
    value: Value<'a>,
    is_const: bool,
}

struct Frame<'a> {
    vars: HashMap<Symbol, Binding<'a>>,
    parent: Option<Env<'a>>,
}

/// A reference-counted link in the runtime scope chain; cloning an `Env`
/// shares the same frame, matching the parent-chain lookup in the
/// original `ScopeImpl`.
#[derive(Clone)]
pub struct Env<'a>(Rc<RefCell<Frame<'a>>>);

impl<'a> Env<'a> {
    pub fn root() -> Self {
        Env(Rc::new(RefCell::new(Frame {
            vars: HashMap::new(),
            parent: None,
        })))
    }

    pub fn child(parent: &Env<'a>) -> Self {
        Env(Rc::new(RefCell::new(Frame {
            vars: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    pub fn define(&self, name: Symbol, value: Value<'a>, is_const: bool) {
        self.0.borrow_mut().vars.insert(name, Binding { value, is_const });
    }

    pub fn get(&self, name: Symbol) -> Option<Value<'a>> {
        let frame = self.0.borrow();
        if let Some(b) = frame.vars.get(&name) {
            return Some(b.value.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    pub fn is_const(&self, name: Symbol) -> bool {
        let frame = self.0.borrow();
        if let Some(b) = frame.vars.get(&name) {
            return b.is_const;
        }
        frame.parent.as_ref().map(|p| p.is_const(name)).unwrap_or(false)
    }

    /// Snapshots the names and values bound directly in this frame
    /// (not the parent chain) — used to turn a compiled module's
    /// globals into an exports object for importers.
    pub fn own_bindings(&self) -> Vec<(Symbol, Value<'a>)> {
        self.0
            .borrow()
            .vars
            .iter()
            .map(|(name, binding)| (*name, binding.value.clone()))
            .collect()
    }

    /// Updates the nearest containing scope that already defines `name`
    /// (must exist); returns an `UNDEFINED_VARIABLE` error otherwise.
    pub fn assign(&self, name: Symbol, value: Value<'a>, span: Span) -> Result<(), RuntimeError> {
        if self.0.borrow().vars.contains_key(&name) {
            let mut frame = self.0.borrow_mut();
            let binding = frame.vars.get_mut(&name).unwrap();
            if binding.is_const {
                return Err(RuntimeError {
                    code: Code::RUN_GENERIC_ERROR,
                    message: "cannot reassign a built-in intrinsic".to_string(),
                    span,
                });
            }
            binding.value = value;
            return Ok(());
        }
        let parent = self.0.borrow().parent.clone();
        match parent {
            Some(p) => p.assign(name, value, span),
            None => Err(RuntimeError {
                code: Code::RUN_UNDEFINED_VARIABLE,
                message: "assignment to undefined variable".to_string(),
                span,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn child_scope_sees_parent_bindings() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let root = Env::root();
        root.define(name, Value::Int(1), false);
        let child = Env::child(&root);
        assert!(matches!(child.get(name), Some(Value::Int(1))));
    }

    #[test]
    fn assign_updates_nearest_defining_scope() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let root = Env::root();
        root.define(name, Value::Int(1), false);
        let child = Env::child(&root);
        child.assign(name, Value::Int(2), Span::new(1, 1, 1)).unwrap();
        assert!(matches!(root.get(name), Some(Value::Int(2))));
    }

    #[test]
    fn assigning_const_intrinsic_errors() {
        let mut interner = Interner::new();
        let name = interner.intern("print");
        let root = Env::root();
        root.define(name, Value::Int(0), true);
        let result = root.assign(name, Value::Int(1), Span::new(1, 1, 1));
        assert!(result.is_err());
    }

    #[test]
    fn assigning_undefined_name_errors() {
        let mut interner = Interner::new();
        let name = interner.intern("missing");
        let root = Env::root();
        let result = root.assign(name, Value::Int(1), Span::new(1, 1, 1));
        assert!(result.is_err());
    }
}
