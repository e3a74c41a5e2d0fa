//! End-to-end scenarios exercising the full lex -> parse -> semantic-analyze
//! -> interpret pipeline, and the multi-file [`ibci::IBCIEngine`] facade.

use std::fs;

use ibci::arena::Arena;
use ibci::ast::{Expr, Stmt};
use ibci::host::HostRegistry;
use ibci::interp::value::Value;
use ibci::interp::Interpreter;
use ibci::intern::Interner;
use ibci::provider::{LLMProvider, MockProvider};
use ibci::scope::ScopeGraph;
use ibci::{EngineConfig, IBCIEngine};

/// Lexes, parses, semantic-analyzes, and runs `source`, returning the
/// exported globals as a `Value::Dict` keyed by name. Leaking the arenas
/// and interner gives each scenario a `'static` interpreter without
/// threading a lifetime through every test function; these are short-lived
/// test processes, so the leak is harmless.
fn run(source: &str, responses: Vec<&str>) -> Value<'static> {
    run_with_provider(source, Box::new(MockProvider::new(responses)))
}

fn run_with_provider(source: &str, provider: Box<dyn LLMProvider>) -> Value<'static> {
    let expr_arena: &'static Arena<Expr> = Box::leak(Box::new(Arena::new()));
    let stmt_arena: &'static Arena<Stmt> = Box::leak(Box::new(Arena::new()));
    let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));

    let (tokens, lex_issues) = ibci::lexer::lex(source, interner).expect("lex");
    let mut scopes = ScopeGraph::new();
    let out = ibci::parser::parse_module(&tokens, expr_arena, stmt_arena, interner, &mut scopes).expect("parse");
    let mut issues = out.issues;
    issues.merge(lex_issues);
    ibci::semantic::Analyzer::new(&mut scopes, interner)
        .analyze(out.module)
        .expect("semantic analysis");
    issues.check_errors().expect("no compile errors");

    let mut interp = Interpreter::new(interner, provider, Box::new(HostRegistry::new()));
    interp.run_module(out.module).expect("runtime error");
    interp.export_globals()
}

/// Runs `source` expecting a runtime error, returning its message.
fn run_expect_err(source: &str, responses: Vec<&str>) -> String {
    let expr_arena: Arena<Expr> = Arena::new();
    let stmt_arena: Arena<Stmt> = Arena::new();
    let mut interner = Interner::new();
    let (tokens, _) = ibci::lexer::lex(source, &mut interner).unwrap();
    let mut scopes = ScopeGraph::new();
    let out = ibci::parser::parse_module(&tokens, &expr_arena, &stmt_arena, &mut interner, &mut scopes).unwrap();
    ibci::semantic::Analyzer::new(&mut scopes, &interner).analyze(out.module).unwrap();

    let mut interp = Interpreter::new(&interner, Box::new(MockProvider::new(responses)), Box::new(HostRegistry::new()));
    interp.run_module(out.module).unwrap_err().message
}

fn get<'a>(exported: &Value<'a>, name: &str) -> Value<'a> {
    match exported {
        Value::Dict(map) => map
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("'{name}' was not exported")),
        other => panic!("expected an exported globals dict, got {other:?}"),
    }
}

#[test]
fn scenario_1_arithmetic_and_control_flow() {
    let exported = run(
        "int total = 0\nint i = 0\nwhile i < 5:\n    total = total + i\n    i = i + 1\n",
        vec![],
    );
    match get(&exported, "total") {
        Value::Int(10) => {}
        other => panic!("expected total == 10, got {other:?}"),
    }
}

#[test]
fn scenario_2_function_and_class_dispatch() {
    let exported = run(
        "class Counter:\n    int value = 0\n    func bump(self, by):\n        self.value = self.value + by\nCounter c = Counter()\nc.bump(3)\nc.bump(4)\nint result = c.value\n",
        vec![],
    );
    match get(&exported, "result") {
        Value::Int(7) => {}
        other => panic!("expected result == 7, got {other:?}"),
    }
}

/// A `BRANCH` decision that comes back ambiguous is retried once via an
/// `llmexcept` fallback block (§4.6 "decided = false" / retry wrapper):
/// the provider is called exactly twice, the second response decides the
/// branch, and the `if` body runs exactly once.
#[test]
fn scenario_3_llm_decision_with_fallback_retry() {
    let exported = run(
        "int runs = 0\nif @~should we continue?~:\n    runs = runs + 1\nllmexcept:\n    retry\n",
        vec!["maybe", "yes"],
    );
    match get(&exported, "runs") {
        Value::Int(1) => {}
        other => panic!("expected runs == 1, got {other:?}"),
    }
}

/// A fallback block that does not retry leaves the guarded construct
/// "decided = false" (§4.6) rather than erroring, so the `if` body is
/// skipped.
#[test]
fn scenario_3b_fallback_without_retry_decides_false() {
    let exported = run(
        "int runs = 0\nif @~should we continue?~:\n    runs = 1\nllmexcept:\n    runs = -1\n",
        vec!["maybe"],
    );
    match get(&exported, "runs") {
        Value::Int(-1) => {}
        other => panic!("expected runs == -1, got {other:?}"),
    }
}

/// A decision with no fallback block at all surfaces the uncertainty as a
/// runtime error rather than silently deciding false (§4.6).
#[test]
fn scenario_3c_llm_decision_without_fallback_errors() {
    let message = run_expect_err("int runs = 0\nif @~should we continue?~:\n    runs = runs + 1\n", vec!["maybe"]);
    assert!(message.to_lowercase().contains("uncertain"), "unexpected message: {message}");
}

/// An `llm` function whose declared return type is `float` has its
/// response coerced (§4.6 type coercion) rather than returned as a raw
/// string.
#[test]
fn scenario_4_llm_function_return_coercion() {
    let exported = run(
        "llm get_pi() -> float:\n    __user__\n    What is pi, roughly?\nllmend\nfloat result = get_pi()\n",
        vec!["approximately 3.14 or so"],
    );
    match get(&exported, "result") {
        Value::Float(f) => assert!((f - 3.14).abs() < 1e-9, "expected ~3.14, got {f}"),
        other => panic!("expected a coerced float, got {other:?}"),
    }
}

#[test]
fn scenario_5_for_loop_accumulates_list_values() {
    let exported = run(
        "list items = [1, 2, 3, 4]\nint total = 0\nfor item in items:\n    total = total + item\n",
        vec![],
    );
    match get(&exported, "total") {
        Value::Int(10) => {}
        other => panic!("expected total == 10, got {other:?}"),
    }
}

/// Importing a file outside the configured workspace root is rejected by
/// the scheduler's sandbox (§4.7), surfacing as a security error through
/// the [`IBCIEngine`] facade rather than a filesystem error.
#[test]
fn scenario_6_import_outside_workspace_root_is_sandboxed() {
    let workspace = tempfile::tempdir().unwrap();
    let outside = tempfile::tempdir().unwrap();
    fs::write(outside.path().join("secret.ibci"), "int leaked = 1\n").unwrap();
    // A relative import with enough leading dots walks up past the
    // workspace root into `outside`, which the scheduler's sandbox must
    // reject regardless of where on disk that resolves to.
    fs::write(workspace.path().join("main.ibci"), "from ..secret import leaked\n").unwrap();

    let expr_arena: Arena<Expr> = Arena::new();
    let stmt_arena: Arena<Stmt> = Arena::new();
    let mut config = EngineConfig::default();
    config.workspace_root = workspace.path().to_path_buf();
    let factory: Box<dyn Fn() -> Box<dyn LLMProvider>> = Box::new(|| Box::new(MockProvider::new(vec![])) as Box<dyn LLMProvider>);
    let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, factory);
    let mut interner = Interner::new();
    let err = engine.run(&workspace.path().join("main.ibci"), &mut interner).unwrap_err();
    match err {
        ibci::EngineError::Schedule(ibci::scheduler::ScheduleError::Compile(failure)) => {
            assert!(failure.diagnostics.iter().any(|d| d.message.contains("Security Error")));
        }
        other => panic!("expected a sandbox compile failure, got {other:?}"),
    }
}
