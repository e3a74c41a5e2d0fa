//! Compile-time scope graph (spec §3), grounded in the teacher's
//! `src/scope.rs` `ScopeStack`/`ScopeEntry`, generalized from a single
//! stack into a persistent tree so AST nodes can hold a stable reference
//! to the scope they introduce.

use std::collections::HashMap;
use std::rc::Rc;

use crate::intern::Symbol;
use crate::types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    Function,
    Class,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
    UserType,
    Module,
}

/// Index into a [`ScopeGraph`]'s node arena. Stable for the lifetime of the
/// graph; used by AST nodes instead of a raw pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone)]
pub struct RuntimeSymbol {
    pub name: Symbol,
    pub kind: SymbolKind,
    pub type_info: Option<Type>,
    /// Token/AST slice for lazy type resolution; stored as source text
    /// since the AST's arena lifetime does not outlive the scope graph
    /// cleanly across module boundaries.
    pub declared_type_node: Option<String>,
    pub exported_scope: Option<ScopeId>,
    /// For `from m import x as y`: `y`'s origin is `m`'s `x` symbol.
    pub origin_symbol: Option<Rc<RuntimeSymbol>>,
    pub is_const: bool,
}

impl RuntimeSymbol {
    pub fn new(name: Symbol, kind: SymbolKind) -> Self {
        RuntimeSymbol {
            name,
            kind,
            type_info: None,
            declared_type_node: None,
            exported_scope: None,
            origin_symbol: None,
            is_const: false,
        }
    }

    /// Resolves `type_info`, following `origin_symbol` lazily the first
    /// time it is queried (§3 invariant).
    pub fn resolved_type(&self) -> Option<Type> {
        if let Some(t) = &self.type_info {
            return Some(t.clone());
        }
        self.origin_symbol.as_ref().and_then(|o| o.resolved_type())
    }
}

#[derive(Debug)]
pub struct ScopeNode {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub names: HashMap<Symbol, RuntimeSymbol>,
}

impl ScopeNode {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        ScopeNode {
            kind,
            parent,
            names: HashMap::new(),
        }
    }
}

/// Owns every `ScopeNode` created while compiling one module.
#[derive(Debug, Default)]
pub struct ScopeGraph {
    nodes: Vec<ScopeNode>,
}

impl ScopeGraph {
    pub fn new() -> Self {
        ScopeGraph { nodes: Vec::new() }
    }

    pub fn new_root(&mut self, kind: ScopeKind) -> ScopeId {
        self.nodes.push(ScopeNode::new(kind, None));
        ScopeId((self.nodes.len() - 1) as u32)
    }

    pub fn child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        self.nodes.push(ScopeNode::new(kind, Some(parent)));
        ScopeId((self.nodes.len() - 1) as u32)
    }

    pub fn node(&self, id: ScopeId) -> &ScopeNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: ScopeId) -> &mut ScopeNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn define(&mut self, scope: ScopeId, symbol: RuntimeSymbol) {
        self.nodes[scope.0 as usize].names.insert(symbol.name, symbol);
    }

    /// Walks parent links starting at `scope` looking for `name`.
    pub fn resolve(&self, scope: ScopeId, name: Symbol) -> Option<&RuntimeSymbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = &self.nodes[id.0 as usize];
            if let Some(sym) = node.names.get(&name) {
                return Some(sym);
            }
            current = node.parent;
        }
        None
    }

    pub fn resolve_mut(&mut self, scope: ScopeId, name: Symbol) -> Option<&mut RuntimeSymbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if self.nodes[id.0 as usize].names.contains_key(&name) {
                return self.nodes[id.0 as usize].names.get_mut(&name);
            }
            current = self.nodes[id.0 as usize].parent;
        }
        None
    }

    pub fn names_in(&self, scope: ScopeId) -> impl Iterator<Item = Symbol> + '_ {
        self.nodes[scope.0 as usize].names.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;

    #[test]
    fn resolve_walks_parent_chain() {
        let mut graph = ScopeGraph::new();
        let mut interner = Interner::new();
        let global = graph.new_root(ScopeKind::Global);
        let func = graph.child(global, ScopeKind::Function);
        let name = interner.intern("x");
        graph.define(global, RuntimeSymbol::new(name, SymbolKind::Variable));
        assert!(graph.resolve(func, name).is_some());
    }

    #[test]
    fn inner_scope_shadows_outer() {
        let mut graph = ScopeGraph::new();
        let mut interner = Interner::new();
        let global = graph.new_root(ScopeKind::Global);
        let block = graph.child(global, ScopeKind::Block);
        let name = interner.intern("x");
        let mut outer = RuntimeSymbol::new(name, SymbolKind::Variable);
        outer.type_info = Some(Type::Int);
        graph.define(global, outer);
        let mut inner = RuntimeSymbol::new(name, SymbolKind::Variable);
        inner.type_info = Some(Type::Str);
        graph.define(block, inner);
        assert_eq!(graph.resolve(block, name).unwrap().type_info, Some(Type::Str));
    }

    #[test]
    fn const_intrinsic_cannot_be_redefined_silently() {
        let mut graph = ScopeGraph::new();
        let mut interner = Interner::new();
        let global = graph.new_root(ScopeKind::Global);
        let name = interner.intern("print");
        let mut sym = RuntimeSymbol::new(name, SymbolKind::Function);
        sym.is_const = true;
        graph.define(global, sym);
        assert!(graph.resolve(global, name).unwrap().is_const);
    }

    #[test]
    fn origin_symbol_lazily_resolves_type() {
        let mut interner = Interner::new();
        let name = interner.intern("x");
        let mut origin = RuntimeSymbol::new(name, SymbolKind::Variable);
        origin.type_info = Some(Type::Int);
        let mut reexport = RuntimeSymbol::new(name, SymbolKind::Variable);
        reexport.origin_symbol = Some(std::rc::Rc::new(origin));
        assert_eq!(reexport.resolved_type(), Some(Type::Int));
    }
}
