//! Structured logging setup (SPEC_FULL.md §10.2), grounded in `ruff`'s
//! `tracing`+`tracing-subscriber` + `EnvFilter` convention. Every pipeline
//! stage targets a `"ibci::<stage>"` string (`"ibci::lexer"`, `"ibci::llm"`,
//! ...) instead of the original `CoreDebugger.trace(module, level, message)`
//! calls.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber reading `RUST_LOG`, defaulting to
/// `warn` when unset. Call once, from the CLI's `main` or a test harness;
/// calling it twice is a no-op (the second `set_global_default` is ignored).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
