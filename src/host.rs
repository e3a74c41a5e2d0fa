//! Host collaborator seam (spec §6.3): external module implementations
//! addressable by name, with optional compile-time type metadata.

use std::collections::HashMap;

use crate::interp::value::Value;
use crate::scope::ScopeNode;

/// Provides (a) external module implementations reachable by name and
/// (b) optional compile-time `ScopeNode` metadata so the semantic
/// analyzer can check cross-boundary calls without reflection.
pub trait HostInterface<'a> {
    fn module_value(&self, name: &str) -> Option<Value<'a>>;
    fn module_scope(&self, name: &str) -> Option<&ScopeNode>;
}

/// Default empty registry: no external modules are provided.
#[derive(Default)]
pub struct HostRegistry<'a> {
    modules: HashMap<String, Value<'a>>,
}

impl<'a> HostRegistry<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, value: Value<'a>) {
        self.modules.insert(name.into(), value);
    }
}

impl<'a> HostInterface<'a> for HostRegistry<'a> {
    fn module_value(&self, name: &str) -> Option<Value<'a>> {
        self.modules.get(name).cloned()
    }

    fn module_scope(&self, _name: &str) -> Option<&ScopeNode> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_module_is_retrievable() {
        let mut host = HostRegistry::new();
        host.register("math_helpers", Value::Int(42));
        assert!(matches!(host.module_value("math_helpers"), Some(Value::Int(42))));
    }

    #[test]
    fn unregistered_module_is_none() {
        let host: HostRegistry = HostRegistry::new();
        assert!(host.module_value("missing").is_none());
    }
}
