//! IBCI: an interpreter for a small indentation-structured scripting
//! language with first-class LLM-backed expressions and functions
//! (behavior expressions, `llm` functions, and classes that can
//! stringify themselves into a prompt).
//!
//! The pipeline is the usual one for a tree-walking interpreter: source
//! text flows through [`lexer`] and [`prescan`], [`parser`] builds an
//! arena-allocated [`ast`], [`semantic`] resolves names against the
//! [`scope`] graph, and [`interp`] walks the tree, dispatching any
//! behavior expression or `llm` function call through [`interp::llm`]
//! and [`provider`]. [`scheduler`] ties multiple files together into one
//! program, and [`engine`] is the façade a CLI or embedder drives.

pub mod arena;
pub mod ast;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod host;
pub mod intent;
pub mod intern;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod prescan;
pub mod provider;
pub mod scheduler;
pub mod scope;
pub mod semantic;
pub mod suggest;
pub mod token;
pub mod trace;
pub mod types;

pub use config::EngineConfig;
pub use diagnostics::{CompilerFailure, Diagnostic, Severity};
pub use engine::{EngineError, IBCIEngine};
pub use interp::{Interpreter, RuntimeError};
