//! `IBCIEngine` facade (SPEC_FULL.md §11, grounded in the original
//! `core/engine.py`): the single seam an external CLI is built against —
//! `run`, `run_string`, and `check` (static analysis only, no execution).
//! Bundles the [`Scheduler`], a growing table of already-executed
//! modules' exported globals, and the limits an [`Interpreter`] is built
//! with.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::arena::Arena;
use crate::ast::{Expr, Stmt};
use crate::config::EngineConfig;
use crate::diagnostics::CompilerFailure;
use crate::host::HostRegistry;
use crate::interp::value::Value;
use crate::interp::{Interpreter, RuntimeError};
use crate::intern::Interner;
use crate::provider::LLMProvider;
use crate::scheduler::{ScheduleError, Scheduler};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Compile(#[from] CompilerFailure),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Constructs a fresh provider for each compiled module the engine runs.
/// Most programs are single-file, so this closure is typically called
/// once; multi-file programs get one independent provider per module
/// rather than sharing call-count/retry state across module boundaries.
pub type ProviderFactory = Box<dyn Fn() -> Box<dyn LLMProvider>>;

pub struct IBCIEngine<'a> {
    scheduler: Scheduler<'a>,
    config: EngineConfig,
    provider_factory: ProviderFactory,
    exports: HashMap<String, Value<'a>>,
}

impl<'a> IBCIEngine<'a> {
    pub fn new(
        config: EngineConfig,
        expr_arena: &'a Arena<Expr<'a>>,
        stmt_arena: &'a Arena<Stmt<'a>>,
        provider_factory: ProviderFactory,
    ) -> Self {
        let scheduler = Scheduler::new(config.workspace_root.clone(), expr_arena, stmt_arena);
        IBCIEngine {
            scheduler,
            config,
            provider_factory,
            exports: HashMap::new(),
        }
    }

    /// Allow-lists one path outside the workspace root (SPEC_FULL.md §11
    /// `allow_file`); forwarded to the underlying scheduler.
    pub fn allow_path(&mut self, path: impl Into<std::path::PathBuf>) {
        self.scheduler.allow_path(path);
    }

    /// Compiles (lex, parse, semantic-analyze) `entry` and everything it
    /// transitively imports, without executing anything.
    pub fn check(&mut self, entry: &Path, interner: &mut Interner) -> Result<(), EngineError> {
        self.scheduler.compile_entry(entry, interner)?;
        for path in self.scheduler.compile_order().to_vec() {
            let module = self.scheduler.compiled(&path).expect("just compiled");
            module.issues.check_errors()?;
        }
        Ok(())
    }

    /// Compiles and runs `entry` and every module it transitively
    /// imports, dependencies first, wiring each finished module's
    /// globals into a host registry so later imports resolve them.
    pub fn run(&mut self, entry: &Path, interner: &'a mut Interner) -> Result<Value<'a>, EngineError> {
        self.scheduler.compile_entry(entry, interner)?;
        self.run_compiled(interner)
    }

    /// Compiles and runs `code` as a standalone top-level module (not
    /// backed by a real file); any imports it contains are still resolved
    /// and sandboxed against the configured workspace root.
    pub fn run_string(&mut self, code: &str, interner: &'a mut Interner) -> Result<Value<'a>, EngineError> {
        self.scheduler.compile_string(code, interner)?;
        self.run_compiled(interner)
    }

    fn run_compiled(&mut self, interner: &'a Interner) -> Result<Value<'a>, EngineError> {
        let order = self.scheduler.compile_order().to_vec();
        let mut last = Value::None_;
        for path in &order {
            let module = self.scheduler.compiled(path).expect("just compiled");
            module.issues.check_errors()?;

            let mut host = HostRegistry::new();
            for (name, value) in &self.exports {
                host.register(name.clone(), value.clone());
            }

            let provider = (self.provider_factory)();
            let mut interpreter = Interpreter::new(interner, provider, Box::new(host))
                .with_limits(self.config.max_instructions, self.config.max_call_stack)
                .with_retry_limit(self.config.retry_limit);
            interpreter.run_module(module.ast)?;

            let exported = interpreter.export_globals();
            let dotted = self.scheduler.dotted_name_for(path);
            if !dotted.is_empty() {
                self.exports.insert(dotted, exported.clone());
            }
            last = exported;
        }
        Ok(last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;
    use std::fs;

    fn provider_factory(responses: Vec<&'static str>) -> ProviderFactory {
        Box::new(move || Box::new(MockProvider::new(responses.clone())) as Box<dyn LLMProvider>)
    }

    #[test]
    fn run_executes_entry_and_exposes_its_globals() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.ibci"), "int x = 1 + 2\n").unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut config = EngineConfig::default();
        config.workspace_root = dir.path().to_path_buf();
        let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, provider_factory(vec![]));
        let mut interner = Interner::new();
        let exported = engine.run(&dir.path().join("main.ibci"), &mut interner).unwrap();
        match exported {
            Value::Dict(map) => {
                let x_name = interner.lookup("x").unwrap();
                assert!(matches!(map.borrow().get(interner.resolve(x_name)), Some(Value::Int(3))));
            }
            other => panic!("expected exported globals dict, got {other:?}"),
        }
    }

    #[test]
    fn dependency_module_is_visible_to_the_entry_module() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("helper.ibci"), "int h = 41\n").unwrap();
        fs::write(
            dir.path().join("main.ibci"),
            "from helper import h\nint total = h + 1\n",
        )
        .unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut config = EngineConfig::default();
        config.workspace_root = dir.path().to_path_buf();
        let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, provider_factory(vec![]));
        let mut interner = Interner::new();
        let exported = engine.run(&dir.path().join("main.ibci"), &mut interner).unwrap();
        match exported {
            Value::Dict(map) => {
                let total_name = interner.lookup("total").unwrap();
                assert!(matches!(
                    map.borrow().get(interner.resolve(total_name)),
                    Some(Value::Int(42))
                ));
            }
            other => panic!("expected exported globals dict, got {other:?}"),
        }
    }

    #[test]
    fn check_reports_compile_errors_without_running_anything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.ibci"), "int x = \n").unwrap();
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut config = EngineConfig::default();
        config.workspace_root = dir.path().to_path_buf();
        let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, provider_factory(vec![]));
        let mut interner = Interner::new();
        assert!(engine.check(&dir.path().join("main.ibci"), &mut interner).is_err());
    }
}
