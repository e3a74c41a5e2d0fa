//! Module Scheduler (spec §4.7): resolves `import`/`from ... import`
//! statements to file paths under the workspace root, builds a dependency
//! graph, detects cycles, and compiles dependencies before dependents,
//! caching each analyzed module's AST by canonical path.
//!
//! File resolution and the workspace sandbox follow the teacher's
//! `project::loader::Loader` (`file:` scheme resolution + canonicalize
//! + "escapes project root" rejection); the dependency walk adds cycle
//! detection via a DFS recursion stack, which the teacher's loader cache
//! alone does not provide.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::arena::Arena;
use crate::ast::{Expr, Stmt};
use crate::diagnostics::{Code, CompilerFailure, IssueTracker, Severity};
use crate::intern::Interner;
use crate::scope::ScopeGraph;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("failed to read module '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Compile(#[from] CompilerFailure),
}

/// One successfully compiled file: its AST root plus the scope graph and
/// diagnostics produced while compiling it.
pub struct CompiledModule<'a> {
    pub path: PathBuf,
    pub ast: &'a Stmt<'a>,
    pub scopes: ScopeGraph,
    pub issues: IssueTracker,
}

/// Compiles a closed set of `.ibci` files reachable from one entry file,
/// topologically ordered so dependencies finish before dependents.
pub struct Scheduler<'a> {
    workspace_root: PathBuf,
    expr_arena: &'a Arena<Expr<'a>>,
    stmt_arena: &'a Arena<Stmt<'a>>,
    cache: HashMap<PathBuf, CompiledModule<'a>>,
    /// Paths explicitly allowed outside `workspace_root` (spec.md §9 /
    /// SPEC_FULL.md §11 `allow_file` escape hatch).
    allow_paths: HashSet<PathBuf>,
    /// Topological compile order, entry module last.
    order: Vec<PathBuf>,
}

impl<'a> Scheduler<'a> {
    pub fn new(workspace_root: impl Into<PathBuf>, expr_arena: &'a Arena<Expr<'a>>, stmt_arena: &'a Arena<Stmt<'a>>) -> Self {
        Scheduler {
            workspace_root: workspace_root.into(),
            expr_arena,
            stmt_arena,
            cache: HashMap::new(),
            allow_paths: HashSet::new(),
            order: Vec::new(),
        }
    }

    /// Allow-lists one path outside the workspace root (e.g. a temp file
    /// holding a code string passed to `run_string`). Caller-driven, not
    /// a default — does not weaken the sandbox for any other path.
    pub fn allow_path(&mut self, path: impl Into<PathBuf>) {
        self.allow_paths.insert(path.into());
    }

    pub fn compiled(&self, path: &Path) -> Option<&CompiledModule<'a>> {
        self.cache.get(path)
    }

    pub fn compile_order(&self) -> &[PathBuf] {
        &self.order
    }

    /// Compiles `entry` and every file it (transitively) imports, in
    /// dependency order, then returns the entry module's compiled form.
    pub fn compile_entry(&mut self, entry: &Path, interner: &mut Interner) -> Result<&CompiledModule<'a>, ScheduleError> {
        let canonical = self.canonicalize_checked(entry)?;
        let mut stack = Vec::new();
        self.compile_recursive(&canonical, &mut stack, interner)?;
        Ok(self.cache.get(&canonical).expect("just compiled"))
    }

    /// Compiles a source string as though it were a top-level workspace
    /// module, resolving any imports it contains against `workspace_root`
    /// the same way a real file's absolute imports would resolve
    /// (SPEC_FULL.md §11 `run_string`). The string itself is exempt from
    /// the path sandbox — it was never read from disk — but anything it
    /// imports still goes through the ordinary sandboxed resolution.
    pub fn compile_string(&mut self, source: &str, interner: &mut Interner) -> Result<&CompiledModule<'a>, ScheduleError> {
        let synthetic_path = self.workspace_root.join("<string>.ibci");
        let mut stack = Vec::new();
        self.compile_source_at(&synthetic_path, source, &mut stack, interner)?;
        Ok(self.cache.get(&synthetic_path).expect("just compiled"))
    }

    /// Maps a compiled file's path back to the dotted module name that an
    /// `import`/`from ... import` elsewhere in the workspace would use to
    /// reach it — the inverse of [`Self::resolve_module_path`].
    pub fn dotted_name_for(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.workspace_root).unwrap_or(path);
        let without_ext = relative.with_extension("");
        let parts: Vec<String> = without_ext
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .filter(|p| p != "__init__")
            .collect();
        parts.join(".")
    }

    fn compile_recursive(&mut self, path: &Path, stack: &mut Vec<PathBuf>, interner: &mut Interner) -> Result<(), ScheduleError> {
        if self.cache.contains_key(path) {
            return Ok(());
        }
        if stack.iter().any(|p| p == path) {
            let mut cycle_issues = IssueTracker::new();
            let mut cycle_desc: Vec<String> = stack.iter().map(|p| p.display().to_string()).collect();
            cycle_desc.push(path.display().to_string());
            cycle_issues.report(
                Severity::Fatal,
                Code::SCHED_CIRCULAR_DEPENDENCY,
                format!("circular import detected: {}", cycle_desc.join(" -> ")),
                None,
            )?;
            unreachable!("Fatal report always returns Err before reaching here");
        }

        let source = fs::read_to_string(path).map_err(|source| ScheduleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_source_at(path, &source, stack, interner)
    }

    /// Shared compile body for both a real file (`compile_recursive`,
    /// after reading it) and an in-memory string (`compile_string`):
    /// lex, parse, recursively compile dependencies, semantic-analyze,
    /// then cache the result under `path`.
    fn compile_source_at(
        &mut self,
        path: &Path,
        source: &str,
        stack: &mut Vec<PathBuf>,
        interner: &mut Interner,
    ) -> Result<(), ScheduleError> {
        stack.push(path.to_path_buf());

        let (tokens, lex_issues) = crate::lexer::lex(source, interner)?;
        let mut scopes = ScopeGraph::new();
        let parse_out = crate::parser::parse_module(&tokens, self.expr_arena, self.stmt_arena, interner, &mut scopes)?;
        let mut issues = parse_out.issues;
        issues.merge(lex_issues);

        let dependencies = self.discover_dependencies(parse_out.module, interner, path)?;
        for dep in &dependencies {
            self.compile_recursive(dep, stack, interner)?;
        }

        crate::semantic::Analyzer::new(&mut scopes, interner)
            .analyze(parse_out.module)
            .map(|analyzer_issues| issues.merge(analyzer_issues))?;

        stack.pop();
        self.order.push(path.to_path_buf());
        self.cache.insert(
            path.to_path_buf(),
            CompiledModule {
                path: path.to_path_buf(),
                ast: parse_out.module,
                scopes,
                issues,
            },
        );
        Ok(())
    }

    /// Scans a module's top-level statements for `import`/`from ...
    /// import` and resolves each to a sandboxed canonical path (spec
    /// §4.7 step 1). Only top-level imports participate in the
    /// dependency graph, matching the original grammar's module-scope
    /// restriction on import statements.
    fn discover_dependencies(&self, module: &'a Stmt<'a>, interner: &mut Interner, from_file: &Path) -> Result<Vec<PathBuf>, ScheduleError> {
        let Stmt::Module { body, .. } = module else {
            return Ok(Vec::new());
        };
        let mut deps = Vec::new();
        for stmt in body {
            let (module_sym, level) = match stmt {
                Stmt::Import { module, level, .. } => (*module, *level),
                Stmt::ImportFrom { module, level, .. } => (*module, *level),
                _ => continue,
            };
            let dotted = interner.resolve(module_sym).to_string();
            let resolved = self.resolve_module_path(from_file, &dotted, level)?;
            let canonical = self.canonicalize_checked(&resolved)?;
            deps.push(canonical);
        }
        Ok(deps)
    }

    /// Resolves a dotted module path (with `level` leading dots) to the
    /// on-disk `.ibci` file or package `__init__.ibci`, relative to the
    /// workspace root (absolute imports) or to `from_file`'s enclosing
    /// package (relative imports), per spec §4.7 step 1.
    fn resolve_module_path(&self, from_file: &Path, dotted: &str, level: u32) -> Result<PathBuf, ScheduleError> {
        let mut base_dir = if level == 0 {
            self.workspace_root.clone()
        } else {
            let mut dir = from_file.parent().unwrap_or(&self.workspace_root).to_path_buf();
            for _ in 0..level.saturating_sub(1) {
                dir = dir.parent().map(Path::to_path_buf).unwrap_or(dir);
            }
            dir
        };
        if !dotted.is_empty() {
            for part in dotted.split('.') {
                base_dir.push(part);
            }
        }
        let as_file = base_dir.with_extension("ibci");
        if as_file.is_file() {
            return Ok(as_file);
        }
        let as_package = base_dir.join("__init__.ibci");
        Ok(as_package)
    }

    /// Canonicalizes `path` and rejects it unless it resolves inside
    /// `workspace_root` or was explicitly allow-listed (spec §6.3
    /// FileSystem/path sandbox; SPEC_FULL.md §11 `allow_path`).
    fn canonicalize_checked(&self, path: &Path) -> Result<PathBuf, ScheduleError> {
        if self.allow_paths.contains(path) {
            return Ok(path.to_path_buf());
        }
        let canonical_root = self.workspace_root.canonicalize().unwrap_or_else(|_| self.workspace_root.clone());
        let canonical_path = match path.canonicalize() {
            Ok(p) => p,
            Err(source) => {
                return Err(ScheduleError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if self.allow_paths.contains(&canonical_path) || canonical_path.starts_with(&canonical_root) {
            return Ok(canonical_path);
        }
        let mut issues = IssueTracker::new();
        issues.report(
            Severity::Fatal,
            Code::SCHED_SANDBOX_VIOLATION,
            format!(
                "Security Error: cannot load '{}' - path escapes workspace root '{}'",
                path.display(),
                self.workspace_root.display()
            ),
            None,
        )?;
        unreachable!("Fatal report always returns Err before reaching here")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn compiles_entry_with_no_imports() {
        let dir = tempfile::tempdir().unwrap();
        let entry = write(dir.path(), "main.ibci", "int x = 1\n");
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scheduler = Scheduler::new(dir.path(), &expr_arena, &stmt_arena);
        let mut interner = Interner::new();
        let compiled = scheduler.compile_entry(&entry, &mut interner).unwrap();
        assert!(matches!(compiled.ast, Stmt::Module { .. }));
    }

    #[test]
    fn compiles_dependency_before_dependent() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "helper.ibci", "int h = 1\n");
        let entry = write(dir.path(), "main.ibci", "import helper\n");
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scheduler = Scheduler::new(dir.path(), &expr_arena, &stmt_arena);
        let mut interner = Interner::new();
        scheduler.compile_entry(&entry, &mut interner).unwrap();
        let order = scheduler.compile_order();
        let helper_pos = order.iter().position(|p| p.ends_with("helper.ibci")).unwrap();
        let main_pos = order.iter().position(|p| p.ends_with("main.ibci")).unwrap();
        assert!(helper_pos < main_pos);
    }

    #[test]
    fn circular_import_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.ibci", "import b\n");
        let entry = write(dir.path(), "b.ibci", "import a\n");
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scheduler = Scheduler::new(dir.path(), &expr_arena, &stmt_arena);
        let mut interner = Interner::new();
        let err = scheduler.compile_entry(&entry, &mut interner).unwrap_err();
        assert!(matches!(err, ScheduleError::Compile(_)));
    }

    #[test]
    fn path_escaping_workspace_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        write(outside.path(), "secret.ibci", "int s = 1\n");
        let entry = write(dir.path(), "main.ibci", "from ..secret import X\n");
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scheduler = Scheduler::new(dir.path(), &expr_arena, &stmt_arena);
        let mut interner = Interner::new();
        let err = scheduler.compile_entry(&entry, &mut interner).unwrap_err();
        match err {
            ScheduleError::Compile(failure) => {
                assert!(failure.diagnostics.iter().any(|d| d.message.contains("Security Error")));
            }
            other => panic!("expected a sandbox compile failure, got {other:?}"),
        }
    }

    #[test]
    fn allow_path_permits_an_explicit_outside_file() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        let temp_entry = write(outside.path(), "scratch.ibci", "int x = 1\n");
        let expr_arena: Arena<Expr> = Arena::new();
        let stmt_arena: Arena<Stmt> = Arena::new();
        let mut scheduler = Scheduler::new(dir.path(), &expr_arena, &stmt_arena);
        scheduler.allow_path(temp_entry.clone());
        let mut interner = Interner::new();
        scheduler.compile_entry(&temp_entry, &mut interner).unwrap();
    }
}
