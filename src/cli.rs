//! IBCI command-line interface: `ibci run`/`ibci check`, the thin
//! external seam [`IBCIEngine`] is built for. Styled after the teacher's
//! `largo` CLI (`clap::Parser`/`Subcommand`, plain `Result<(), Box<dyn
//! Error>>` command functions).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::arena::Arena;
use crate::config::EngineConfig;
use crate::engine::{IBCIEngine, ProviderFactory};
use crate::intern::Interner;
use crate::provider::{LLMProvider, MockProvider};

#[derive(Parser)]
#[command(name = "ibci")]
#[command(about = "Interpreter for IBCI, a scripting language with LLM-backed expressions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a .ibci file
    Run {
        /// Entry file to run
        file: PathBuf,
        /// Path to a TOML config file (defaults built in otherwise)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Lex, parse, and semantic-analyze a .ibci file without running it
    Check {
        /// Entry file to check
        file: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Entry point for the CLI.
pub fn run_cli() -> Result<(), Box<dyn std::error::Error>> {
    crate::trace::init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { file, config } => cmd_run(&file, config.as_deref()),
        Commands::Check { file, config } => cmd_check(&file, config.as_deref()),
    }
}

fn load_config(path: Option<&std::path::Path>, workspace_root: &std::path::Path) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match path {
        Some(p) => EngineConfig::load(p)?,
        None => EngineConfig::default(),
    };
    config.workspace_root = workspace_root.to_path_buf();
    Ok(config)
}

/// Builds an `LLMProvider` factory from the config's optional provider
/// block: `HttpProvider` under the `http` feature, or a responseless
/// `MockProvider` otherwise (errors only if the program actually invokes
/// an `llm` behavior or function).
fn provider_factory(config: &EngineConfig) -> ProviderFactory {
    #[cfg(feature = "http")]
    if let Some(provider) = config.provider.clone() {
        return Box::new(move || {
            Box::new(crate::provider::http::HttpProvider::new(provider.endpoint.clone(), provider.model.clone())) as Box<dyn LLMProvider>
        });
    }
    let _ = config;
    Box::new(|| Box::new(MockProvider::new(vec![])) as Box<dyn LLMProvider>)
}

fn cmd_run(file: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let workspace_root = file.parent().unwrap_or(std::path::Path::new(".")).to_path_buf();
    let config = load_config(config_path, &workspace_root)?;
    let expr_arena: Arena<crate::ast::Expr> = Arena::new();
    let stmt_arena: Arena<crate::ast::Stmt> = Arena::new();
    let factory = provider_factory(&config);
    let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, factory);
    let mut interner = Interner::new();
    engine.run(file, &mut interner)?;
    Ok(())
}

fn cmd_check(file: &std::path::Path, config_path: Option<&std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
    let workspace_root = file.parent().unwrap_or(std::path::Path::new(".")).to_path_buf();
    let config = load_config(config_path, &workspace_root)?;
    let expr_arena: Arena<crate::ast::Expr> = Arena::new();
    let stmt_arena: Arena<crate::ast::Stmt> = Arena::new();
    let factory = provider_factory(&config);
    let mut engine = IBCIEngine::new(config, &expr_arena, &stmt_arena, factory);
    let mut interner = Interner::new();
    engine.check(file, &mut interner)?;
    println!("Check passed");
    Ok(())
}
